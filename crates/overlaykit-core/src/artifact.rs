use anyhow::anyhow;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Base,
    Overlay,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 2] = [ArtifactKind::Base, ArtifactKind::Overlay];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Overlay => "overlay",
        }
    }

    pub fn parse(input: &str) -> anyhow::Result<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "base" => Ok(Self::Base),
            "overlay" => Ok(Self::Overlay),
            other => Err(anyhow!(
                "unsupported artifact kind '{other}'; supported: base, overlay"
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactSpec {
    pub kind: ArtifactKind,
    /// Artifact flavour understood by the cache (for example the repository
    /// an archive is built from).
    pub source: String,
    pub tag: String,
}

/// The pair of artifacts one install attempt puts in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VersionDescriptor {
    pub base: ArtifactSpec,
    pub overlay: ArtifactSpec,
}

impl VersionDescriptor {
    pub const DEFAULT_BASE_SOURCE: &'static str = "base";
    pub const DEFAULT_OVERLAY_SOURCE: &'static str = "overlay";

    pub fn new(base_tag: impl Into<String>, overlay_tag: impl Into<String>) -> Self {
        Self::with_sources(
            Self::DEFAULT_BASE_SOURCE,
            base_tag,
            Self::DEFAULT_OVERLAY_SOURCE,
            overlay_tag,
        )
    }

    pub fn with_sources(
        base_source: impl Into<String>,
        base_tag: impl Into<String>,
        overlay_source: impl Into<String>,
        overlay_tag: impl Into<String>,
    ) -> Self {
        Self {
            base: ArtifactSpec {
                kind: ArtifactKind::Base,
                source: base_source.into(),
                tag: base_tag.into(),
            },
            overlay: ArtifactSpec {
                kind: ArtifactKind::Overlay,
                source: overlay_source.into(),
                tag: overlay_tag.into(),
            },
        }
    }

    pub fn artifact(&self, kind: ArtifactKind) -> &ArtifactSpec {
        match kind {
            ArtifactKind::Base => &self.base,
            ArtifactKind::Overlay => &self.overlay,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        for kind in ArtifactKind::ALL {
            let spec = self.artifact(kind);
            if spec.kind != kind {
                return Err(anyhow!(
                    "artifact spec in the {} slot declares kind '{}'",
                    kind.as_str(),
                    spec.kind.as_str()
                ));
            }
            if spec.tag.trim().is_empty() {
                return Err(anyhow!("{} tag must not be empty", kind.as_str()));
            }
            if spec.tag.contains(['/', '\\']) || spec.tag.contains("..") {
                return Err(anyhow!(
                    "{} tag contains path characters: {}",
                    kind.as_str(),
                    spec.tag
                ));
            }
        }
        Ok(())
    }
}
