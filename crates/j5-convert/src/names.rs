//! File, package and generated-type naming.
//!
//! These conventions are shared with other J5 tooling and must not drift:
//! `foo/v1/bar.j5s` produces `foo/v1/bar.j5s.proto`, and its service and
//! topic declarations land in `foo/v1/<sub>/bar.p.j5s.proto` under package
//! `foo.v1.<sub>`.

pub const SOURCE_EXT: &str = ".j5s";
pub const SUB_SERVICE: &str = "service";
pub const SUB_TOPIC: &str = "topic";

/// Main descriptor file for a source path.
pub fn proto_filename(source_path: &str) -> String {
    format!("{source_path}.proto")
}

/// Descriptor file for a sub-package of a source path.
pub fn sub_filename(source_path: &str, sub: &str) -> String {
    let (dir, base) = match source_path.rsplit_once('/') {
        Some((dir, base)) => (Some(dir), base),
        None => (None, source_path),
    };
    let stem = base.strip_suffix(SOURCE_EXT).unwrap_or(base);
    match dir {
        Some(dir) => format!("{dir}/{sub}/{stem}.p.j5s.proto"),
        None => format!("{sub}/{stem}.p.j5s.proto"),
    }
}

pub fn sub_package(package: &str, sub: &str) -> String {
    format!("{package}.{sub}")
}

/// Maps a proto file path back to its source path, if it is one of ours.
pub fn source_for_proto(proto_path: &str) -> Option<String> {
    if let Some(source) = proto_path.strip_suffix(".p.j5s.proto") {
        let (dir, stem) = source.rsplit_once('/')?;
        let (parent, sub) = dir.rsplit_once('/').unwrap_or(("", dir));
        if sub != SUB_SERVICE && sub != SUB_TOPIC {
            return None;
        }
        return Some(if parent.is_empty() {
            format!("{stem}{SOURCE_EXT}")
        } else {
            format!("{parent}/{stem}{SOURCE_EXT}")
        });
    }
    proto_path.strip_suffix(".proto").filter(|s| s.ends_with(SOURCE_EXT)).map(str::to_string)
}

/// Versioned package (`foo.v1`) from a file path (`foo/v1/bar.j5s`): the
/// directory, up to and including the first `vN` segment.
pub fn package_for_path(path: &str) -> Option<String> {
    let dir = path.rsplit_once('/')?.0;
    let mut parts = Vec::new();
    for segment in dir.split('/') {
        parts.push(segment);
        if is_version_segment(segment) {
            return Some(parts.join("."));
        }
    }
    None
}

pub fn is_version_segment(segment: &str) -> bool {
    segment
        .strip_prefix('v')
        .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
}

/// Name of the synthesized map-entry message, as protoc derives it: the field
/// name in CamelCase (underscores dropped, following letter raised) plus
/// `Entry`.
pub fn map_entry_name(field_name: &str) -> String {
    let mut out = String::with_capacity(field_name.len() + 5);
    let mut upper_next = true;
    for c in field_name.chars() {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            out.push(c.to_ascii_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out.push_str("Entry");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_naming() {
        assert_eq!(proto_filename("foo/v1/bar.j5s"), "foo/v1/bar.j5s.proto");
        assert_eq!(
            sub_filename("foo/v1/bar.j5s", SUB_SERVICE),
            "foo/v1/service/bar.p.j5s.proto"
        );
        assert_eq!(sub_package("foo.v1", SUB_TOPIC), "foo.v1.topic");
    }

    #[test]
    fn proto_maps_back_to_source() {
        assert_eq!(
            source_for_proto("foo/v1/service/bar.p.j5s.proto").as_deref(),
            Some("foo/v1/bar.j5s")
        );
        assert_eq!(
            source_for_proto("foo/v1/bar.j5s.proto").as_deref(),
            Some("foo/v1/bar.j5s")
        );
        assert_eq!(source_for_proto("foo/v1/bar.proto"), None);
    }

    #[test]
    fn package_from_path() {
        assert_eq!(package_for_path("foo/v1/bar.j5s").as_deref(), Some("foo.v1"));
        assert_eq!(
            package_for_path("acme/foo/v2/sub/bar.proto").as_deref(),
            Some("acme.foo.v2")
        );
        assert_eq!(package_for_path("foo/bar.j5s"), None);
        assert!(!is_version_segment("vx"));
    }

    #[test]
    fn map_entry_follows_protoc() {
        assert_eq!(map_entry_name("metadata"), "MetadataEntry");
        assert_eq!(map_entry_name("tag_values"), "TagValuesEntry");
        assert_eq!(map_entry_name("a__b"), "ABEntry");
    }
}
