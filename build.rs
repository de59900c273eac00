use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const CASCADE_ASSET: &str = "assets/haarcascade_frontalface_alt_tree.xml";

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=assets");
    println!("cargo:rerun-if-changed={CASCADE_ASSET}");

    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string()));
    let asset = manifest_dir.join(CASCADE_ASSET);

    let generated = if asset.is_file() {
        let size = fs::metadata(&asset).map(|m| m.len()).unwrap_or(0);
        println!(
            "cargo:warning=Embedding face cascade {} ({:.1} KB)",
            CASCADE_ASSET,
            size as f64 / 1024.0
        );
        format!(
            "/// Cascade definition compiled into the binary\n\
             pub(crate) const BUNDLED_CASCADE: Option<&str> = Some(include_str!({:?}));\n",
            asset.display().to_string()
        )
    } else {
        println!("cargo:warning=No face cascade at {CASCADE_ASSET}; face masking will need an external cascade file");
        "/// Cascade definition compiled into the binary\n\
         pub(crate) const BUNDLED_CASCADE: Option<&str> = None;\n"
            .to_string()
    };

    let out_dir = env::var("OUT_DIR").unwrap_or_else(|_| ".".to_string());
    let target = Path::new(&out_dir).join("bundled_cascade.rs");
    if let Err(e) = fs::write(&target, generated) {
        panic!("Failed to write {}: {e}", target.display());
    }
}
