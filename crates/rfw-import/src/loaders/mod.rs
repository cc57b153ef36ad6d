use crate::source::{SceneImporter, SourceScene};
use crate::ImportError;
use std::collections::HashMap;
use std::fmt::Display;
use std::path::Path;
use std::sync::Arc;

mod gltf;
mod obj;

pub use self::gltf::GltfImporter;
pub use self::obj::ObjImporter;

/// Picks an importer by (case-insensitive) file extension.
#[derive(Debug)]
pub struct ExtensionImporter {
    importers: HashMap<String, Arc<dyn SceneImporter>>,
    extensions: Vec<&'static str>,
}

impl Display for ExtensionImporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "extension-importer")
    }
}

impl Default for ExtensionImporter {
    fn default() -> Self {
        Self::new(Self::create_importers())
    }
}

impl ExtensionImporter {
    /// `importers` maps lower-case extensions (without the dot) to an importer.
    pub fn new(importers: HashMap<String, Arc<dyn SceneImporter>>) -> Self {
        let mut extensions: Vec<&'static str> = ["gltf", "glb", "obj"]
            .iter()
            .copied()
            .filter(|ext| importers.contains_key(*ext))
            .collect();
        extensions.sort_unstable();

        Self {
            importers,
            extensions,
        }
    }

    pub fn create_importers() -> HashMap<String, Arc<dyn SceneImporter>> {
        let mut importers: HashMap<String, Arc<dyn SceneImporter>> = HashMap::new();

        let gltf_importer: Arc<dyn SceneImporter> = Arc::new(GltfImporter::default());
        importers.insert(String::from("gltf"), gltf_importer.clone());
        importers.insert(String::from("glb"), gltf_importer);
        importers.insert(String::from("obj"), Arc::new(ObjImporter::default()));

        importers
    }

    /// Registers (or replaces) the importer used for `extension`.
    pub fn register(&mut self, extension: &'static str, importer: Arc<dyn SceneImporter>) {
        self.importers.insert(extension.to_lowercase(), importer);
        if !self.extensions.contains(&extension) {
            self.extensions.push(extension);
            self.extensions.sort_unstable();
        }
    }

    pub fn importer_for(&self, path: &Path) -> Result<&dyn SceneImporter, ImportError> {
        let extension = match path.extension() {
            Some(ext) => ext.to_string_lossy().to_lowercase(),
            None => return Err(ImportError::NoFileExtension),
        };

        match self.importers.get(&extension) {
            Some(importer) => Ok(importer.as_ref()),
            None => Err(ImportError::NoImporter(extension)),
        }
    }
}

impl SceneImporter for ExtensionImporter {
    fn extensions(&self) -> &[&str] {
        self.extensions.as_slice()
    }

    fn import(&self, path: &Path) -> Result<SourceScene, ImportError> {
        self.importer_for(path)?.import(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Empty;

    impl Display for Empty {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "empty")
        }
    }

    impl SceneImporter for Empty {
        fn extensions(&self) -> &[&str] {
            &["fbx"]
        }

        fn import(&self, _path: &Path) -> Result<SourceScene, ImportError> {
            Ok(SourceScene::default())
        }
    }

    #[test]
    fn dispatches_on_lower_case_extension() {
        let importer = ExtensionImporter::default();
        assert_eq!(importer.extensions(), &["glb", "gltf", "obj"]);
        assert_eq!(
            importer.importer_for(Path::new("a/B.GLB")).unwrap().to_string(),
            "gltf-importer"
        );
        assert_eq!(
            importer.importer_for(Path::new("x.obj")).unwrap().to_string(),
            "obj-importer"
        );
    }

    #[test]
    fn unknown_or_missing_extension() {
        let importer = ExtensionImporter::default();
        assert_eq!(
            importer.import(Path::new("model")).map(|_| ()),
            Err(ImportError::NoFileExtension)
        );
        assert_eq!(
            importer.import(Path::new("model.fbx")).map(|_| ()),
            Err(ImportError::NoImporter(String::from("fbx")))
        );
    }

    #[test]
    fn registered_importer_is_used() {
        let mut importer = ExtensionImporter::default();
        importer.register("fbx", Arc::new(Empty));
        assert!(importer.import(Path::new("model.FBX")).is_ok());
        assert_eq!(importer.extensions(), &["fbx", "glb", "gltf", "obj"]);
    }
}
