use stagehand_foundation::VisionError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::detector::ReIdEncoder;
use crate::types::{FeatureVector, IdentityRecord};

/// On-disk identity database (C5): one directory per identity, each holding
/// representative images. Load is eager; `append` writes a new image and
/// updates the in-memory record without a full reload.
pub struct DescriptorStore {
    root: PathBuf,
    identities: HashMap<String, IdentityRecord>,
}

impl DescriptorStore {
    /// Scans `root`, treating each subdirectory as an identity and running
    /// `encoder` over every image inside it. Identities with no usable
    /// images are omitted entirely.
    pub fn load(root: &Path, encoder: &mut dyn ReIdEncoder) -> Result<Self, VisionError> {
        let mut identities = HashMap::new();

        let entries = std::fs::read_dir(root)?;
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let identity_id = entry.file_name().to_string_lossy().into_owned();
            let mut vectors = Vec::new();

            for image_entry in std::fs::read_dir(entry.path())? {
                let image_entry = image_entry?;
                if !image_entry.file_type()?.is_file() {
                    continue;
                }
                let img = match image::open(image_entry.path()) {
                    Ok(img) => img.to_rgb8(),
                    Err(err) => {
                        tracing::warn!(path = %image_entry.path().display(), error = %err, "skipping unreadable descriptor image");
                        continue;
                    }
                };
                match encoder.extract(&img) {
                    Ok(vector) => vectors.push(vector),
                    Err(err) => tracing::warn!(
                        path = %image_entry.path().display(),
                        error = %err,
                        "Re-ID extraction failed for descriptor image"
                    ),
                }
            }

            if !vectors.is_empty() {
                identities.insert(
                    identity_id.clone(),
                    IdentityRecord {
                        identity_id,
                        vectors,
                    },
                );
            }
        }

        Ok(Self {
            root: root.to_path_buf(),
            identities,
        })
    }

    pub fn empty(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            identities: HashMap::new(),
        }
    }

    /// Finds the closest identity under `threshold`, comparing `query`
    /// against every stored vector. Returns `None` for the identity if no
    /// vector is within threshold, plus the best distance found regardless.
    pub fn match_descriptor(
        &self,
        query: &FeatureVector,
        threshold: f32,
    ) -> (Option<String>, f32) {
        let mut best_identity: Option<String> = None;
        let mut best_distance = f32::MAX;

        for record in self.identities.values() {
            for vector in &record.vectors {
                let distance = query.l2_distance(vector);
                if distance < best_distance {
                    best_distance = distance;
                    best_identity = Some(record.identity_id.clone());
                }
            }
        }

        if best_distance < threshold {
            (best_identity, best_distance)
        } else {
            (None, best_distance)
        }
    }

    /// Writes `image` to `root/identity/<uuid>.jpg` and appends the
    /// extracted vector to the in-memory record. Creates the identity
    /// directory and record if this is the first image for it.
    pub fn append(
        &mut self,
        identity: &str,
        image: &image::RgbImage,
        encoder: &mut dyn ReIdEncoder,
    ) -> Result<(), VisionError> {
        let dir = self.root.join(identity);
        std::fs::create_dir_all(&dir)?;

        let filename = format!("{}.jpg", uuid::Uuid::new_v4());
        let path = dir.join(filename);
        image
            .save(&path)
            .map_err(|e| VisionError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;

        let vector = encoder
            .extract(image)
            .map_err(VisionError::InferenceFailed)?;

        self.identities
            .entry(identity.to_string())
            .or_insert_with(|| IdentityRecord {
                identity_id: identity.to_string(),
                vectors: Vec::new(),
            })
            .vectors
            .push(vector);

        Ok(())
    }

    pub fn identity_count(&self) -> usize {
        self.identities.len()
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.identities.contains_key(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ConstantEncoder(f32);
    impl ReIdEncoder for ConstantEncoder {
        fn extract(&mut self, _crop: &image::RgbImage) -> Result<FeatureVector, String> {
            Ok(FeatureVector([self.0; 512]))
        }
    }

    #[test]
    fn match_descriptor_returns_none_above_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let store = DescriptorStore::empty(dir.path());
        let query = FeatureVector([1.0; 512]);
        let (identity, _distance) = store.match_descriptor(&query, 0.1);
        assert!(identity.is_none());
    }

    #[test]
    fn append_then_match_finds_the_identity() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DescriptorStore::empty(dir.path());
        let mut encoder = ConstantEncoder(1.0);
        let image = image::RgbImage::new(4, 4);

        store.append("alice", &image, &mut encoder).unwrap();
        assert!(store.contains("alice"));

        let query = FeatureVector([1.0; 512]);
        let (identity, distance) = store.match_descriptor(&query, 15.0);
        assert_eq!(identity.as_deref(), Some("alice"));
        assert_eq!(distance, 0.0);
    }
}
