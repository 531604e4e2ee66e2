//! Documentation page listing the keyring members by role.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use minijinja::{Environment, UndefinedBehavior, context, path_loader};
use serde::Serialize;
use tracing::{debug, info};

use crate::directory::EntityDirectory;
use crate::error::{Error, Result};
use crate::types::{Entity, Role};

pub const DEFAULT_TEMPLATE_NAME: &str = "entities.rst.j2";
const DEFAULT_TEMPLATE: &str = include_str!("../templates/entities.rst.j2");

/// Entities grouped by their exclusive role, each group in
/// [`EntityDirectory::sorted_handles`] order.
#[derive(Debug, Default)]
pub struct RoleBuckets<'a> {
    pub developers: Vec<&'a Entity>,
    pub contributors: Vec<&'a Entity>,
    pub bots: Vec<&'a Entity>,
}

impl<'a> RoleBuckets<'a> {
    /// Fails for an entity without exactly one exclusive role instead of
    /// dropping it from the page.
    pub fn from_directory(directory: &'a EntityDirectory) -> Result<Self> {
        let mut buckets = Self::default();
        for entity in directory
            .sorted_handles()
            .into_iter()
            .filter_map(|handle| directory.get(handle))
        {
            let bucket = match entity.primary_role() {
                Some(Role::Developer) => &mut buckets.developers,
                Some(Role::Contributor) => &mut buckets.contributors,
                Some(Role::Bot) => &mut buckets.bots,
                _ => {
                    let exclusive = entity.exclusive_roles();
                    return Err(Error::EntityConsistency {
                        handle: entity.handle.clone(),
                        count: exclusive.len(),
                        roles: exclusive,
                    });
                }
            };
            bucket.push(entity);
        }
        Ok(buckets)
    }

    pub fn len(&self) -> usize {
        self.developers.len() + self.contributors.len() + self.bots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn view(&self) -> BucketsView<'a> {
        let views = |entities: &[&'a Entity]| -> Vec<EntityView<'a>> {
            entities.iter().copied().map(EntityView::new).collect()
        };
        BucketsView {
            developers: views(&self.developers),
            contributors: views(&self.contributors),
            bots: views(&self.bots),
        }
    }
}

#[derive(Serialize)]
struct BucketsView<'a> {
    developers: Vec<EntityView<'a>>,
    contributors: Vec<EntityView<'a>>,
    bots: Vec<EntityView<'a>>,
}

#[derive(Serialize)]
struct EntityView<'a> {
    handle: &'a str,
    name: &'a str,
    keyids: &'a [String],
    roles: Vec<Role>,
    key_listings: &'a BTreeMap<String, String>,
    keys: Vec<KeyView<'a>>,
}

#[derive(Serialize)]
struct KeyView<'a> {
    keyid: &'a str,
    listing: Option<Vec<&'a str>>,
}

impl<'a> EntityView<'a> {
    fn new(entity: &'a Entity) -> Self {
        let keys = entity
            .keyids
            .iter()
            .map(|keyid| KeyView {
                keyid,
                listing: entity.key_listings.get(keyid).map(|text| {
                    text.lines()
                        .map(str::trim_end)
                        .filter(|line| !line.is_empty())
                        .collect()
                }),
            })
            .collect();

        Self {
            handle: &entity.handle,
            name: &entity.name,
            keyids: &entity.keyids,
            roles: entity.roles.iter().copied().collect(),
            key_listings: &entity.key_listings,
            keys,
        }
    }
}

/// Renders the entity directory through a Jinja2 template.
///
/// The template sees `entities.developers`, `entities.contributors` and
/// `entities.bots`; each entity has `handle`, `name`, `keyids`, `roles`,
/// `key_listings` (key ID to gpg listing) and `keys` (key ID plus listing
/// lines, `none` when no listing was read). Undefined variables are errors.
#[derive(Debug, Clone, Default)]
pub struct Renderer {
    template_file: Option<PathBuf>,
}

impl Renderer {
    /// Uses the built-in reStructuredText template.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a template file instead. Other templates in the same directory
    /// can be included or extended.
    #[must_use]
    pub fn with_template_file(path: impl Into<PathBuf>) -> Self {
        Self {
            template_file: Some(path.into()),
        }
    }

    pub fn render(&self, directory: &EntityDirectory) -> Result<String> {
        let buckets = RoleBuckets::from_directory(directory)?;
        debug!(
            developers = buckets.developers.len(),
            contributors = buckets.contributors.len(),
            bots = buckets.bots.len(),
            "rendering entity documentation"
        );
        let ctx = context! { entities => buckets.view() };

        let mut env = environment();
        let rendered = match &self.template_file {
            None => {
                env.add_template(DEFAULT_TEMPLATE_NAME, DEFAULT_TEMPLATE)?;
                env.get_template(DEFAULT_TEMPLATE_NAME)?.render(ctx)?
            }
            Some(path) => {
                let dir = match path.parent() {
                    Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                    _ => PathBuf::from("."),
                };
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                env.set_loader(path_loader(dir));
                env.get_template(&name)?.render(ctx)?
            }
        };
        Ok(rendered)
    }

    pub fn write(&self, directory: &EntityDirectory, output: &Path) -> Result<()> {
        let rendered = self.render(directory)?;
        std::fs::write(output, rendered).map_err(|source| Error::Write {
            path: output.to_path_buf(),
            source,
        })?;
        info!(path = %output.display(), "wrote entity documentation");
        Ok(())
    }
}

fn environment() -> Environment<'static> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_trim_blocks(true);
    env.set_keep_trailing_newline(true);
    env
}
