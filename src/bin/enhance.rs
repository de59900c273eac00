//! Image enhancement CLI tool
//!
//! Converts an image to grayscale TIFF, optionally masking detected faces.
//! Exit status: 0 success, 1 bad arguments, 2 unsupported format, 3 processing failure.

#[cfg(feature = "cli")]
use image_enhance::cli;

#[cfg(feature = "cli")]
fn main() -> std::process::ExitCode {
    match cli::main() {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            std::process::ExitCode::from(cli::exit_code_for(&err))
        },
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    panic!("CLI feature not enabled. Please rebuild with --features cli");
}
