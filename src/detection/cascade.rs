//! Haar cascade model and OpenCV XML loader
//!
//! Two on-disk layouts are understood:
//!
//! - the current `opencv-cascade-classifier` layout (`stageType`, `featureType`,
//!   `weakClassifiers` with packed `internalNodes`/`leafValues`, shared `features`)
//! - the legacy `opencv-haar-classifier` layout (`size`, `stages` of `trees`, one
//!   feature per node, `left_val`/`left_node` branches and optional
//!   `parent`/`next` links that turn the stage list into a tree)
//!
//! Both are normalised into [`HaarCascade`].

use crate::config::CascadeLocation;
use crate::error::{EnhanceError, Result};
use roxmltree::{Document, Node};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Problems found while reading a cascade definition
#[derive(Error, Debug)]
pub enum CascadeError {
    #[error("malformed XML: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("missing <{0}> element")]
    MissingElement(String),

    #[error("invalid value {value:?} in <{element}>")]
    InvalidValue { element: String, value: String },

    #[error("unsupported cascade: {0}")]
    Unsupported(String),

    #[error("inconsistent cascade: {0}")]
    Inconsistent(String),
}

/// One weighted rectangle of a Haar feature, in window coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HaarRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub weight: f64,
}

/// Weighted sum of two or three rectangles
#[derive(Debug, Clone, PartialEq)]
pub struct HaarFeature {
    pub rects: Vec<HaarRect>,
}

/// Internal node of a weak classifier
///
/// `left`/`right` point to another node when positive and to leaf `-value`
/// otherwise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeNode {
    pub feature: usize,
    pub threshold: f64,
    pub left: i32,
    pub right: i32,
}

/// Decision tree (usually a stump) voting into a stage sum
#[derive(Debug, Clone, PartialEq)]
pub struct WeakClassifier {
    pub nodes: Vec<TreeNode>,
    pub leaves: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    pub threshold: f64,
    pub classifiers: Vec<WeakClassifier>,
    pub parent: Option<usize>,
    pub next: Option<usize>,
    pub child: Option<usize>,
}

/// A boosted cascade of Haar-feature classifiers
#[derive(Debug, Clone, PartialEq)]
pub struct HaarCascade {
    pub window_width: u32,
    pub window_height: u32,
    pub features: Vec<HaarFeature>,
    pub stages: Vec<Stage>,
    /// Stages are linked as a tree through `parent`/`next` rather than run in order
    pub is_tree: bool,
}

impl HaarCascade {
    /// Load a cascade from an OpenCV XML file
    ///
    /// # Errors
    /// - `DetectorLoadFailure` when the file cannot be read or is not a supported cascade
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let xml = std::fs::read_to_string(path)
            .map_err(|e| EnhanceError::detector_load(path, e.to_string()))?;
        let cascade =
            Self::from_xml(&xml).map_err(|e| EnhanceError::detector_load(path, e.to_string()))?;
        tracing::debug!(
            path = %path.display(),
            stages = cascade.stages.len(),
            features = cascade.features.len(),
            window = %format!("{}x{}", cascade.window_width, cascade.window_height),
            tree = cascade.is_tree,
            "Loaded Haar cascade"
        );
        Ok(cascade)
    }

    /// Load whatever [`CascadeSource::resolve`](crate::config::CascadeSource::resolve) found
    ///
    /// # Errors
    /// - `DetectorLoadFailure` when the definition cannot be read or parsed
    pub fn from_location(location: &CascadeLocation) -> Result<Self> {
        match location {
            CascadeLocation::File(path) => Self::from_file(path),
            CascadeLocation::Bundled => {
                let label = location.display_path();
                let xml = super::bundled_cascade()
                    .ok_or_else(|| EnhanceError::detector_load(&label, "no cascade was bundled at build time"))?;
                let cascade =
                    Self::from_xml(xml).map_err(|e| EnhanceError::detector_load(&label, e.to_string()))?;
                tracing::debug!(stages = cascade.stages.len(), "Loaded bundled Haar cascade");
                Ok(cascade)
            },
        }
    }

    /// Parse a cascade from OpenCV XML text
    ///
    /// # Errors
    /// - [`CascadeError`] describing the first problem found
    pub fn from_xml(xml: &str) -> std::result::Result<Self, CascadeError> {
        let document = Document::parse(xml)?;
        let storage = document.root_element();
        let top = elements(storage)
            .next()
            .ok_or_else(|| CascadeError::MissingElement("cascade".to_string()))?;

        let cascade = if child(top, "stageType").is_some() {
            parse_current(top)?
        } else if child(top, "stages").is_some() && child(top, "size").is_some() {
            parse_legacy(top)?
        } else {
            return Err(CascadeError::Unsupported(format!(
                "<{}> is neither a current nor a legacy Haar cascade",
                top.tag_name().name()
            )));
        };
        cascade.check()?;
        Ok(cascade)
    }

    /// Verify every index the evaluator follows stays in bounds
    fn check(&self) -> std::result::Result<(), CascadeError> {
        if self.window_width < 3 || self.window_height < 3 {
            return Err(CascadeError::Inconsistent(format!(
                "window {}x{} is too small",
                self.window_width, self.window_height
            )));
        }
        if self.stages.is_empty() {
            return Err(CascadeError::Inconsistent("no stages".to_string()));
        }
        let (w, h) = (self.window_width as i32, self.window_height as i32);
        for feature in &self.features {
            for r in &feature.rects {
                if r.x < 0 || r.y < 0 || r.width < 0 || r.height < 0 || r.x + r.width > w || r.y + r.height > h {
                    return Err(CascadeError::Inconsistent(format!(
                        "feature rectangle {} {} {} {} leaves the {}x{} window",
                        r.x, r.y, r.width, r.height, w, h
                    )));
                }
            }
        }
        for (si, stage) in self.stages.iter().enumerate() {
            for link in [stage.parent, stage.next, stage.child].into_iter().flatten() {
                if link >= self.stages.len() {
                    return Err(CascadeError::Inconsistent(format!(
                        "stage {si} links to missing stage {link}"
                    )));
                }
            }
            for classifier in &stage.classifiers {
                if classifier.nodes.is_empty() {
                    return Err(CascadeError::Inconsistent(format!(
                        "stage {si} has a classifier without nodes"
                    )));
                }
                for node in &classifier.nodes {
                    if node.feature >= self.features.len() {
                        return Err(CascadeError::Inconsistent(format!(
                            "stage {si} references missing feature {}",
                            node.feature
                        )));
                    }
                    for branch in [node.left, node.right] {
                        let ok = if branch > 0 {
                            (branch as usize) < classifier.nodes.len()
                        } else {
                            (branch.unsigned_abs() as usize) < classifier.leaves.len()
                        };
                        if !ok {
                            return Err(CascadeError::Inconsistent(format!(
                                "stage {si} has a dangling branch {branch}"
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

fn parse_current(top: Node<'_, '_>) -> std::result::Result<HaarCascade, CascadeError> {
    let stage_type = text(required(top, "stageType")?);
    if stage_type != "BOOST" {
        return Err(CascadeError::Unsupported(format!("stage type {stage_type}")));
    }
    let feature_type = text(required(top, "featureType")?);
    if feature_type != "HAAR" {
        return Err(CascadeError::Unsupported(format!("feature type {feature_type}")));
    }
    if let Some(params) = child(top, "featureParams") {
        if let Some(max_cat) = child(params, "maxCatCount") {
            let max_cat: u32 = number(&text(max_cat), "maxCatCount")?;
            if max_cat != 0 {
                return Err(CascadeError::Unsupported("categorical features".to_string()));
            }
        }
    }

    let window_width = number(&text(required(top, "width")?), "width")?;
    let window_height = number(&text(required(top, "height")?), "height")?;

    let mut stages = Vec::new();
    for stage_node in elements(required(top, "stages")?) {
        let threshold = number(&text(required(stage_node, "stageThreshold")?), "stageThreshold")?;
        let mut classifiers = Vec::new();
        for weak in elements(required(stage_node, "weakClassifiers")?) {
            classifiers.push(parse_packed_classifier(weak)?);
        }
        stages.push(Stage {
            threshold,
            classifiers,
            parent: None,
            next: None,
            child: None,
        });
    }

    let mut features = Vec::new();
    for feature_node in elements(required(top, "features")?) {
        features.push(parse_feature(feature_node)?);
    }

    Ok(HaarCascade {
        window_width,
        window_height,
        features,
        stages,
        is_tree: false,
    })
}

/// `internalNodes` holds `left right featureIdx threshold` quadruples
fn parse_packed_classifier(weak: Node<'_, '_>) -> std::result::Result<WeakClassifier, CascadeError> {
    let packed = text(required(weak, "internalNodes")?);
    let values: Vec<&str> = packed.split_whitespace().collect();
    if values.is_empty() || values.len() % 4 != 0 {
        return Err(CascadeError::InvalidValue {
            element: "internalNodes".to_string(),
            value: packed.clone(),
        });
    }
    let mut nodes = Vec::with_capacity(values.len() / 4);
    for quad in values.chunks_exact(4) {
        if let [left, right, feature, threshold] = quad {
            nodes.push(TreeNode {
                left: number(left, "internalNodes")?,
                right: number(right, "internalNodes")?,
                feature: number(feature, "internalNodes")?,
                threshold: number(threshold, "internalNodes")?,
            });
        }
    }
    let leaves = numbers(&text(required(weak, "leafValues")?), "leafValues")?;
    Ok(WeakClassifier { nodes, leaves })
}

fn parse_legacy(top: Node<'_, '_>) -> std::result::Result<HaarCascade, CascadeError> {
    let size: Vec<u32> = numbers(&text(required(top, "size")?), "size")?;
    let (window_width, window_height) = match size.as_slice() {
        [w, h] => (*w, *h),
        _ => {
            return Err(CascadeError::InvalidValue {
                element: "size".to_string(),
                value: format!("{size:?}"),
            })
        },
    };

    let mut features = Vec::new();
    let mut stages = Vec::new();
    for stage_node in elements(required(top, "stages")?) {
        let mut classifiers = Vec::new();
        for tree in elements(required(stage_node, "trees")?) {
            classifiers.push(parse_legacy_tree(tree, &mut features)?);
        }
        let threshold = number(&text(required(stage_node, "stage_threshold")?), "stage_threshold")?;
        stages.push(Stage {
            threshold,
            classifiers,
            parent: stage_link(stage_node, "parent")?,
            next: stage_link(stage_node, "next")?,
            child: None,
        });
    }

    let is_tree = stages.iter().any(|stage| stage.next.is_some());
    if is_tree {
        for index in 0..stages.len() {
            let first_child = stages.iter().position(|s| s.parent == Some(index));
            if let Some(stage) = stages.get_mut(index) {
                stage.child = first_child;
            }
        }
    }

    Ok(HaarCascade {
        window_width,
        window_height,
        features,
        stages,
        is_tree,
    })
}

/// Legacy trees keep one feature per node and name their branches explicitly
fn parse_legacy_tree(
    tree: Node<'_, '_>,
    features: &mut Vec<HaarFeature>,
) -> std::result::Result<WeakClassifier, CascadeError> {
    let mut nodes = Vec::new();
    let mut leaves = Vec::new();
    for node in elements(tree) {
        features.push(parse_feature(required(node, "feature")?)?);
        let feature = features.len() - 1;
        let threshold = number(&text(required(node, "threshold")?), "threshold")?;
        let left = legacy_branch(node, "left_val", "left_node", &mut leaves)?;
        let right = legacy_branch(node, "right_val", "right_node", &mut leaves)?;
        nodes.push(TreeNode {
            feature,
            threshold,
            left,
            right,
        });
    }
    Ok(WeakClassifier { nodes, leaves })
}

fn legacy_branch(
    node: Node<'_, '_>,
    value_tag: &str,
    node_tag: &str,
    leaves: &mut Vec<f64>,
) -> std::result::Result<i32, CascadeError> {
    if let Some(value) = child(node, value_tag) {
        leaves.push(number(&text(value), value_tag)?);
        Ok(-((leaves.len() - 1) as i32))
    } else if let Some(target) = child(node, node_tag) {
        let target: i32 = number(&text(target), node_tag)?;
        if target <= 0 {
            return Err(CascadeError::InvalidValue {
                element: node_tag.to_string(),
                value: target.to_string(),
            });
        }
        Ok(target)
    } else {
        Err(CascadeError::MissingElement(value_tag.to_string()))
    }
}

fn stage_link(stage: Node<'_, '_>, tag: &str) -> std::result::Result<Option<usize>, CascadeError> {
    match child(stage, tag) {
        None => Ok(None),
        Some(node) => {
            let value: i64 = number(&text(node), tag)?;
            Ok(usize::try_from(value).ok())
        },
    }
}

fn parse_feature(feature: Node<'_, '_>) -> std::result::Result<HaarFeature, CascadeError> {
    if let Some(tilted) = child(feature, "tilted") {
        let tilted: i32 = number(&text(tilted), "tilted")?;
        if tilted != 0 {
            return Err(CascadeError::Unsupported("tilted Haar features".to_string()));
        }
    }
    let mut rects = Vec::new();
    for rect in elements(required(feature, "rects")?) {
        let raw = text(rect);
        let values: Vec<&str> = raw.split_whitespace().collect();
        let [x, y, width, height, weight] = values.as_slice() else {
            return Err(CascadeError::InvalidValue {
                element: "rects".to_string(),
                value: raw.clone(),
            });
        };
        rects.push(HaarRect {
            x: number(x, "rects")?,
            y: number(y, "rects")?,
            width: number(width, "rects")?,
            height: number(height, "rects")?,
            weight: number(weight, "rects")?,
        });
    }
    if rects.is_empty() {
        return Err(CascadeError::MissingElement("rects/_".to_string()));
    }
    Ok(HaarFeature { rects })
}

fn elements<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(Node::is_element)
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    elements(node).find(|n| n.tag_name().name() == name)
}

fn required<'a, 'input>(
    node: Node<'a, 'input>,
    name: &str,
) -> std::result::Result<Node<'a, 'input>, CascadeError> {
    child(node, name).ok_or_else(|| CascadeError::MissingElement(name.to_string()))
}

/// Concatenated text content, ignoring comments
fn text(node: Node<'_, '_>) -> String {
    node.children()
        .filter(Node::is_text)
        .filter_map(|n| n.text())
        .collect::<String>()
        .trim()
        .to_string()
}

fn number<T: FromStr>(raw: &str, element: &str) -> std::result::Result<T, CascadeError> {
    raw.trim().parse().map_err(|_| CascadeError::InvalidValue {
        element: element.to_string(),
        value: raw.to_string(),
    })
}

fn numbers<T: FromStr>(raw: &str, element: &str) -> std::result::Result<Vec<T>, CascadeError> {
    raw.split_whitespace().map(|v| number(v, element)).collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// One-stage cascade that fires when the centre of a 20x20 window is darker than its border
    pub(crate) const DARK_CENTER_CASCADE: &str = r#"<?xml version="1.0"?>
<opencv_storage>
<cascade type_id="opencv-cascade-classifier">
  <stageType>BOOST</stageType>
  <featureType>HAAR</featureType>
  <height>20</height>
  <width>20</width>
  <stageParams><maxWeakCount>1</maxWeakCount></stageParams>
  <featureParams><maxCatCount>0</maxCatCount></featureParams>
  <stageNum>1</stageNum>
  <stages>
    <_>
      <maxWeakCount>1</maxWeakCount>
      <stageThreshold>0.</stageThreshold>
      <weakClassifiers>
        <_>
          <!-- stump -->
          <internalNodes>0 -1 0 -5.0000000000000000e-01</internalNodes>
          <leafValues>1. -1.</leafValues>
        </_>
      </weakClassifiers>
    </_>
  </stages>
  <features>
    <_>
      <rects>
        <_>0 0 20 20 -1.</_>
        <_>5 5 10 10 4.</_>
      </rects>
    </_>
  </features>
</cascade>
</opencv_storage>
"#;

    /// Same classifier in the legacy layout
    pub(crate) const DARK_CENTER_LEGACY: &str = r#"<?xml version="1.0"?>
<opencv_storage>
<dark_center type_id="opencv-haar-classifier">
  <size>20 20</size>
  <stages>
    <_>
      <!-- stage 0 -->
      <trees>
        <_>
          <!-- tree 0 -->
          <_>
            <!-- root node -->
            <feature>
              <rects>
                <_>0 0 20 20 -1.</_>
                <_>5 5 10 10 4.</_>
              </rects>
              <tilted>0</tilted>
            </feature>
            <threshold>-0.5</threshold>
            <left_val>1.</left_val>
            <right_val>-1.</right_val>
          </_>
        </_>
      </trees>
      <stage_threshold>0.</stage_threshold>
      <parent>-1</parent>
      <next>-1</next>
    </_>
  </stages>
</dark_center>
</opencv_storage>
"#;

    /// Legacy two-node tree: a dark centre sends the window on to a left-versus-right
    /// test that votes against a left half darker than the right
    pub(crate) const DARK_CENTER_TWO_NODE: &str = r#"<?xml version="1.0"?>
<opencv_storage>
<two_node type_id="opencv-haar-classifier">
  <size>20 20</size>
  <stages>
    <_>
      <trees>
        <_>
          <_>
            <feature>
              <rects>
                <_>0 0 20 20 -1.</_>
                <_>5 5 10 10 4.</_>
              </rects>
              <tilted>0</tilted>
            </feature>
            <threshold>-0.5</threshold>
            <left_node>1</left_node>
            <right_val>-1.</right_val>
          </_>
          <_>
            <feature>
              <rects>
                <_>0 0 20 20 -1.</_>
                <_>0 0 10 20 2.</_>
              </rects>
              <tilted>0</tilted>
            </feature>
            <threshold>0.</threshold>
            <left_val>-1.</left_val>
            <right_val>1.</right_val>
          </_>
        </_>
      </trees>
      <stage_threshold>0.</stage_threshold>
      <parent>-1</parent>
      <next>-1</next>
    </_>
  </stages>
</two_node>
</opencv_storage>
"#;

    #[test]
    fn test_parse_current_layout() {
        let cascade = HaarCascade::from_xml(DARK_CENTER_CASCADE).unwrap();
        assert_eq!((cascade.window_width, cascade.window_height), (20, 20));
        assert_eq!(cascade.stages.len(), 1);
        assert_eq!(cascade.features.len(), 1);
        assert!(!cascade.is_tree);

        let classifier = &cascade.stages[0].classifiers[0];
        assert_eq!(
            classifier.nodes[0],
            TreeNode {
                feature: 0,
                threshold: -0.5,
                left: 0,
                right: -1
            }
        );
        assert_eq!(classifier.leaves, vec![1.0, -1.0]);
        assert_eq!(cascade.features[0].rects[1].weight, 4.0);
    }

    #[test]
    fn test_legacy_layout_matches_current() {
        let current = HaarCascade::from_xml(DARK_CENTER_CASCADE).unwrap();
        let legacy = HaarCascade::from_xml(DARK_CENTER_LEGACY).unwrap();
        assert_eq!(legacy, current);
    }

    #[test]
    fn test_legacy_node_branches() {
        let cascade = HaarCascade::from_xml(DARK_CENTER_TWO_NODE).unwrap();
        assert_eq!(cascade.features.len(), 2);
        assert_eq!(cascade.features[1].rects[1].width, 10);

        let classifier = &cascade.stages[0].classifiers[0];
        assert_eq!(
            classifier.nodes,
            vec![
                TreeNode {
                    feature: 0,
                    threshold: -0.5,
                    left: 1,
                    right: 0
                },
                TreeNode {
                    feature: 1,
                    threshold: 0.0,
                    left: -1,
                    right: -2
                },
            ]
        );
        assert_eq!(classifier.leaves, vec![-1.0, -1.0, 1.0]);
    }

    #[test]
    fn test_legacy_branch_to_root_is_rejected() {
        let xml = DARK_CENTER_TWO_NODE.replace("<left_node>1</left_node>", "<left_node>0</left_node>");
        assert!(matches!(
            HaarCascade::from_xml(&xml).unwrap_err(),
            CascadeError::InvalidValue { .. }
        ));
    }

    #[test]
    fn test_legacy_stage_tree_links() {
        let stage = |parent: i32, next: i32| {
            format!(
                "<_><trees><_><_><feature><rects><_>0 0 4 4 1.</_></rects></feature>\
                 <threshold>0</threshold><left_val>1</left_val><right_val>-1</right_val></_></_></trees>\
                 <stage_threshold>0</stage_threshold><parent>{parent}</parent><next>{next}</next></_>"
            )
        };
        let xml = format!(
            "<opencv_storage><tree type_id=\"opencv-haar-classifier\"><size>4 4</size><stages>{}{}{}</stages></tree></opencv_storage>",
            stage(-1, -1),
            stage(0, 2),
            stage(0, -1)
        );
        let cascade = HaarCascade::from_xml(&xml).unwrap();
        assert!(cascade.is_tree);
        assert_eq!(cascade.stages[0].child, Some(1));
        assert_eq!(cascade.stages[1].next, Some(2));
        assert_eq!(cascade.stages[1].parent, Some(0));
        assert_eq!(cascade.stages[2].child, None);
        assert_eq!(cascade.features.len(), 3);
    }

    #[test]
    fn test_rejects_lbp_cascade() {
        let xml = DARK_CENTER_CASCADE.replace("<featureType>HAAR", "<featureType>LBP");
        let err = HaarCascade::from_xml(&xml).unwrap_err();
        assert!(matches!(err, CascadeError::Unsupported(_)));
    }

    #[test]
    fn test_rejects_tilted_features() {
        let xml = DARK_CENTER_LEGACY.replace("<tilted>0</tilted>", "<tilted>1</tilted>");
        let err = HaarCascade::from_xml(&xml).unwrap_err();
        assert!(err.to_string().contains("tilted"));
    }

    #[test]
    fn test_rejects_dangling_feature_index() {
        let xml = DARK_CENTER_CASCADE.replace("0 -1 0 -5.", "0 -1 3 -5.");
        let err = HaarCascade::from_xml(&xml).unwrap_err();
        assert!(matches!(err, CascadeError::Inconsistent(_)));
    }

    #[test]
    fn test_rejects_malformed_documents() {
        assert!(matches!(
            HaarCascade::from_xml("<opencv_storage><cascade>").unwrap_err(),
            CascadeError::Xml(_)
        ));
        assert!(matches!(
            HaarCascade::from_xml("<opencv_storage/>").unwrap_err(),
            CascadeError::MissingElement(_)
        ));
        assert!(matches!(
            HaarCascade::from_xml("<opencv_storage><svm><support/></svm></opencv_storage>")
                .unwrap_err(),
            CascadeError::Unsupported(_)
        ));
        let bad_number = DARK_CENTER_CASCADE.replace("<width>20</width>", "<width>wide</width>");
        assert!(matches!(
            HaarCascade::from_xml(&bad_number).unwrap_err(),
            CascadeError::InvalidValue { .. }
        ));
    }

    #[test]
    fn test_from_file_maps_to_detector_load_failure() {
        let err = HaarCascade::from_file("/nonexistent/haarcascade.xml").unwrap_err();
        assert!(matches!(err, EnhanceError::DetectorLoadFailure { .. }));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.xml");
        std::fs::write(&path, "not xml at all").unwrap();
        let err = HaarCascade::from_file(&path).unwrap_err();
        assert!(matches!(err, EnhanceError::DetectorLoadFailure { .. }));
        assert!(err.to_string().contains("broken.xml"));
    }
}
