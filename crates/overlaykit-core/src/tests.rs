use std::path::{Path, PathBuf};

use super::*;

const FULL_CONFIG: &str = r#"
runtime_dir = "/opt/editor/Data/il2cpp"
target_name = "libil2cpp"
helper_root = "/work/project/HybridHelper"
overlay_subdir = "huatuo"
version_file = "/work/project/HybridHelper/version.json"
cache_dir = "/work/cache"

[[seed]]
name = "il2cpp"
source = "/opt/editor/Data/il2cpp"

[[seed]]
name = "MonoBleedingEdge"
source = "/opt/editor/Data/MonoBleedingEdge"

[artifacts.base]
source = "il2cpp_plus"
archive = "il2cpp_plus-{tag}.zip"
inner_folder = "il2cpp_plus-{tag}/libil2cpp"

[artifacts.overlay]
source = "huatuo"
archive = "huatuo-{tag}.zip"
inner_folder = "huatuo-{tag}/huatuo"
"#;

#[test]
fn parse_full_config() {
    let config = OverlayConfig::from_toml_str(FULL_CONFIG).expect("config should parse");
    assert_eq!(config.runtime_dir, PathBuf::from("/opt/editor/Data/il2cpp"));
    assert_eq!(config.target_name, "libil2cpp");
    assert_eq!(config.overlay_subdir, "huatuo");
    assert_eq!(config.seeds.len(), 2);
    assert_eq!(config.seeds[1].name, "MonoBleedingEdge");
    assert_eq!(config.cache_dir.as_deref(), Some(Path::new("/work/cache")));
    assert_eq!(config.source_for(ArtifactKind::Base), "il2cpp_plus");
    assert_eq!(config.source_for(ArtifactKind::Overlay), "huatuo");
}

#[test]
fn parse_minimal_config_uses_defaults() {
    let config = OverlayConfig::from_toml_str(
        r#"
runtime_dir = "runtime"
helper_root = "helper"
"#,
    )
    .expect("minimal config should parse");
    assert_eq!(config.target_name, "libil2cpp");
    assert_eq!(config.overlay_subdir, "huatuo");
    assert!(config.version_file.is_none());
    assert!(config.seeds.is_empty());
    assert_eq!(config.artifacts.base.source, "base");
    assert_eq!(config.artifacts.overlay.archive, "{source}-{tag}.zip");
}

#[test]
fn templates_render_tag_and_source() {
    let config = OverlayConfig::from_toml_str(FULL_CONFIG).expect("config should parse");
    let descriptor = VersionDescriptor::with_sources("il2cpp_plus", "v1.2", "huatuo", "2024.08");

    let base = config.artifacts.get(ArtifactKind::Base);
    assert_eq!(base.archive_file_name(&descriptor.base), "il2cpp_plus-v1.2.zip");
    assert_eq!(
        base.inner_folder(&descriptor.base),
        "il2cpp_plus-v1.2/libil2cpp"
    );

    let overlay = config.artifacts.get(ArtifactKind::Overlay);
    assert_eq!(
        overlay.archive_file_name(&descriptor.overlay),
        "huatuo-2024.08.zip"
    );
    assert_eq!(
        overlay.inner_folder(&descriptor.overlay),
        "huatuo-2024.08/huatuo"
    );
}

#[test]
fn default_templates_use_source_placeholder() {
    let sources = ArtifactSources::default();
    let descriptor = VersionDescriptor::new("v1", "v2");
    assert_eq!(
        sources.base.archive_file_name(&descriptor.base),
        "base-v1.zip"
    );
    assert_eq!(sources.overlay.inner_folder(&descriptor.overlay), "overlay-v2");
}

#[test]
fn rejects_target_name_with_separator() {
    let err = OverlayConfig::from_toml_str(
        r#"
runtime_dir = "/r"
helper_root = "/h"
target_name = "lib/il2cpp"
"#,
    )
    .expect_err("nested target name must be rejected");
    assert!(err.to_string().contains("target_name"));
}

#[test]
fn rejects_overlay_subdir_escaping_base() {
    let err = OverlayConfig::from_toml_str(
        r#"
runtime_dir = "/r"
helper_root = "/h"
overlay_subdir = "../outside"
"#,
    )
    .expect_err("escaping overlay subdir must be rejected");
    assert!(err.to_string().contains("overlay_subdir"));
}

#[test]
fn rejects_helper_root_inside_target() {
    let err = OverlayConfig::from_toml_str(
        r#"
runtime_dir = "/r"
helper_root = "/r/libil2cpp/helper"
"#,
    )
    .expect_err("helper inside target must be rejected");
    assert!(err.to_string().contains("helper_root"));
}

#[test]
fn rejects_empty_artifact_source() {
    let err = OverlayConfig::from_toml_str(
        r#"
runtime_dir = "/r"
helper_root = "/h"

[artifacts.base]
source = " "
"#,
    )
    .expect_err("blank source must be rejected");
    assert!(err.to_string().contains("artifacts.base.source"));
}

#[test]
fn relative_paths_resolve_against_config_dir() {
    let mut config = OverlayConfig::from_toml_str(
        r#"
runtime_dir = "runtime"
helper_root = "/abs/helper"
cache_dir = "cache"

[[seed]]
name = "il2cpp"
source = "host/il2cpp"
"#,
    )
    .expect("config should parse");
    config.resolve_relative_to(Path::new("/project"));
    assert_eq!(config.runtime_dir, PathBuf::from("/project/runtime"));
    assert_eq!(config.helper_root, PathBuf::from("/abs/helper"));
    assert_eq!(config.cache_dir, Some(PathBuf::from("/project/cache")));
    assert_eq!(config.seeds[0].source, PathBuf::from("/project/host/il2cpp"));
}

#[test]
fn artifact_kind_parse_is_case_insensitive() {
    assert_eq!(ArtifactKind::parse("Base").expect("base"), ArtifactKind::Base);
    assert_eq!(
        ArtifactKind::parse(" overlay ").expect("overlay"),
        ArtifactKind::Overlay
    );
    assert!(ArtifactKind::parse("patch").is_err());
}

#[test]
fn descriptor_accessor_returns_matching_slot() {
    let descriptor = VersionDescriptor::new("v1.2", "2024.08");
    assert_eq!(descriptor.artifact(ArtifactKind::Base).tag, "v1.2");
    assert_eq!(descriptor.artifact(ArtifactKind::Overlay).tag, "2024.08");
    descriptor.validate().expect("descriptor should validate");
}

#[test]
fn descriptor_rejects_empty_or_path_like_tags() {
    let empty = VersionDescriptor::new("", "2024.08");
    assert!(empty.validate().is_err());

    let traversal = VersionDescriptor::new("v1", "../../etc");
    let err = traversal.validate().expect_err("path tag must be rejected");
    assert!(err.to_string().contains("overlay tag"));
}

#[test]
fn descriptor_rejects_swapped_kinds() {
    let mut descriptor = VersionDescriptor::new("v1", "v2");
    std::mem::swap(&mut descriptor.base, &mut descriptor.overlay);
    assert!(descriptor.validate().is_err());
}

#[test]
fn default_record_means_never_installed() {
    let record = InstalledVersionRecord::default();
    assert!(!record.is_installed());
    assert_eq!(record.install_timestamp_millis, 0);

    let mut installed = InstalledVersionRecord {
        base_tag: "v1.2".to_string(),
        overlay_tag: "2024.08".to_string(),
        ..InstalledVersionRecord::default()
    };
    assert!(installed.is_installed());
    assert!(installed.matches(&VersionDescriptor::new("v1.2", "2024.08")));
    assert!(!installed.matches(&VersionDescriptor::new("v1.3", "2024.08")));

    installed.clear_tags();
    assert!(!installed.is_installed());
}
