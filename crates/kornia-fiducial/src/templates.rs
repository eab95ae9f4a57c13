use std::collections::BTreeMap;

use kornia_image::Image;

use crate::errors::FiducialError;

/// Resolves a template specifier into named grayscale images.
pub trait TemplateLoader {
    /// Loads the templates selected by `spec`.
    ///
    /// # Errors
    ///
    /// Returns [`FiducialError::TemplateLoad`] if the specifier cannot be resolved.
    fn load(&self, spec: &str) -> Result<Vec<(String, Image<u8, 1>)>, FiducialError>;
}

/// Templates held in memory, selected by name.
///
/// A specifier is a list of names separated by commas or whitespace. `*` selects every
/// template and a trailing `*` selects all names with the given prefix.
///
/// # Example
///
/// ```
/// use kornia_image::Image;
/// use kornia_fiducial::templates::{InMemoryTemplateLoader, TemplateLoader};
///
/// let mut loader = InMemoryTemplateLoader::default();
/// loader.insert("art1", Image::from_size_val([8, 8].into(), 255).unwrap());
/// loader.insert("art2", Image::from_size_val([8, 8].into(), 0).unwrap());
/// loader.insert("other", Image::from_size_val([8, 8].into(), 0).unwrap());
///
/// let loaded = loader.load("art*").unwrap();
/// assert_eq!(loaded.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryTemplateLoader {
    images: BTreeMap<String, Image<u8, 1>>,
}

impl InMemoryTemplateLoader {
    /// Stores a template, replacing any previous one with the same name.
    pub fn insert(&mut self, name: impl Into<String>, image: Image<u8, 1>) {
        self.images.insert(name.into(), image);
    }

    /// Number of stored templates.
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Whether no template is stored.
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

impl TemplateLoader for InMemoryTemplateLoader {
    fn load(&self, spec: &str) -> Result<Vec<(String, Image<u8, 1>)>, FiducialError> {
        let tokens = spec
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>();
        if tokens.is_empty() {
            return Err(FiducialError::TemplateLoad("empty specifier".to_string()));
        }

        let mut selected: Vec<&String> = Vec::new();
        for token in tokens {
            let matching: Vec<&String> = match token.strip_suffix('*') {
                Some(prefix) => self
                    .images
                    .keys()
                    .filter(|name| name.starts_with(prefix))
                    .collect(),
                None => match self.images.get_key_value(token) {
                    Some((name, _)) => vec![name],
                    None => {
                        return Err(FiducialError::TemplateLoad(format!(
                            "no template named '{token}'"
                        )))
                    }
                },
            };
            for name in matching {
                if !selected.contains(&name) {
                    selected.push(name);
                }
            }
        }

        Ok(selected
            .into_iter()
            .map(|name| (name.clone(), self.images[name].clone()))
            .collect())
    }
}
