//! Banner plugin: prepends a comment to matching artifacts

use async_trait::async_trait;

use super::{Asset, Plugin};
use crate::config::{Pattern, PluginConfig};
use crate::error::{BuildError, Result};

pub struct BannerPlugin {
    text: String,
    include: Option<Pattern>,
}

impl BannerPlugin {
    /// `text` is wrapped in a `/*! */` comment unless `raw` is set
    pub fn new(text: &str, raw: bool, include: Option<Pattern>) -> Self {
        let text = if raw {
            text.to_string()
        } else if text.contains('\n') {
            let mut comment = String::from("/*!\n");
            for line in text.lines() {
                comment.push_str(&format!(" * {}\n", line).replace(" * \n", " *\n"));
            }
            comment.push_str(" */");
            comment
        } else {
            format!("/*! {} */", text)
        };
        Self { text, include }
    }

    pub fn from_config(config: &PluginConfig) -> Result<Self> {
        let text = config.str_option("banner").ok_or_else(|| {
            BuildError::config("plugin `banner` needs a `banner` string option")
        })?;
        let include = config
            .pattern_option("include")
            .map_err(BuildError::Config)?
            .map(|p| p.compile())
            .transpose()?;
        Ok(Self::new(
            text,
            config.bool_option("raw").unwrap_or(false),
            include,
        ))
    }
}

#[async_trait]
impl Plugin for BannerPlugin {
    fn name(&self) -> &str {
        "banner"
    }

    fn applies_to(&self, asset: &Asset) -> bool {
        self.include
            .as_ref()
            .map(|p| p.matches(&asset.filename))
            .unwrap_or(true)
    }

    async fn process(&self, asset: &mut Asset) -> Result<()> {
        asset.code = format!("{}\n{}", self.text, asset.code);
        if let Some(map) = asset.map.as_mut() {
            map.prepend_lines(self.text.matches('\n').count() + 1);
        }
        Ok(())
    }
}
