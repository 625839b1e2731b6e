use std::fs;
use std::path::Path;

use tera::{Context, Tera};

use crate::config::TemplateConfig;
use crate::docker::env;
use crate::docker::model::RuntimeContainer;
use crate::error::Error;

/// The external collaborator distilled §1 names: a pure function from
/// `(config, containers)` to "did the output change". The core only depends
/// on this trait, never on a concrete template engine (§4.3).
pub trait Renderer: Send + Sync {
    fn render(&self, config: &TemplateConfig, containers: &[RuntimeContainer]) -> Result<bool, Error>;
}

/// Default `Renderer`, using `tera` to compile `config.src` and writing
/// `config.dest` only when the rendered content differs from what is already
/// there (distilled §4.3's `changed` boolean).
///
/// Does not reimplement docker-gen's polymorphic template helpers
/// (`where`, `groupBy`, `closest`, ...) — those are the out-of-scope
/// "polymorphic helpers for the template data model" collaborator (§1).
#[derive(Default)]
pub struct TeraRenderer;

impl Renderer for TeraRenderer {
    fn render(&self, config: &TemplateConfig, containers: &[RuntimeContainer]) -> Result<bool, Error> {
        let template_source = fs::read_to_string(&config.src)?;

        let mut tera = Tera::default();
        tera.add_raw_template("current", &template_source)
            .map_err(|source| Error::Render {
                dest: config.dest.display().to_string(),
                source,
            })?;

        let env_snapshot = env::snapshot();
        let mut context = Context::new();
        context.insert("containers", containers);
        context.insert("docker_endpoints", &env_snapshot.endpoints());

        let rendered = tera
            .render("current", &context)
            .map_err(|source| Error::Render {
                dest: config.dest.display().to_string(),
                source,
            })?;

        write_if_changed(&config.dest, &rendered)
    }
}

fn write_if_changed(dest: &Path, contents: &str) -> Result<bool, Error> {
    let existing = fs::read_to_string(dest).ok();
    if existing.as_deref() == Some(contents) {
        return Ok(false);
    }

    if let Some(parent) = dest.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = dest.with_extension("dockgen-tmp");
    fs::write(&tmp_path, contents)?;
    fs::rename(&tmp_path, dest)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("dockgen-test-{}-{name}", std::process::id()))
    }

    #[test]
    fn write_if_changed_skips_identical_content() {
        let dest = temp_path("dest-identical");
        fs::write(&dest, "hello").unwrap();

        let changed = write_if_changed(&dest, "hello").unwrap();
        assert!(!changed);

        let _ = fs::remove_file(&dest);
    }

    #[test]
    fn write_if_changed_writes_new_content() {
        let dest = temp_path("dest-new");
        let _ = fs::remove_file(&dest);

        let changed = write_if_changed(&dest, "hello").unwrap();
        assert!(changed);
        assert_eq!(fs::read_to_string(&dest).unwrap(), "hello");

        let _ = fs::remove_file(&dest);
    }

    #[test]
    fn write_if_changed_overwrites_differing_content() {
        let dest = temp_path("dest-differing");
        fs::write(&dest, "old").unwrap();

        let changed = write_if_changed(&dest, "new").unwrap();
        assert!(changed);
        assert_eq!(fs::read_to_string(&dest).unwrap(), "new");

        let _ = fs::remove_file(&dest);
    }
}
