//! Deflate-compressed zip container holding the package members in memory.

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
use std::path::{Component, Path};

use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::ProjectFileError;

/// Package members keyed by their `/`-separated path inside the archive.
pub(crate) type Members = BTreeMap<String, Vec<u8>>;

/// Uncompressed size above which a single member is refused.
const MAX_MEMBER_SIZE: u64 = 1 << 30;

pub(crate) fn pack(members: &Members) -> Result<Vec<u8>, ProjectFileError> {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in members {
        writer
            .start_file(name.as_str(), options)
            .map_err(|error| zip_failure(format!("adding {name}"), error))?;
        writer
            .write_all(data)
            .map_err(|source| ProjectFileError::io(format!("adding {name}"), source))?;
    }
    let cursor = writer
        .finish()
        .map_err(|error| zip_failure("finishing archive", error))?;
    Ok(cursor.into_inner())
}

pub(crate) fn unpack(bytes: &[u8]) -> Result<Members, ProjectFileError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|error| ProjectFileError::corrupt(format!("invalid archive: {error}")))?;
    let mut members = Members::new();
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|error| ProjectFileError::corrupt(format!("unreadable entry: {error}")))?;
        if entry.is_dir() {
            continue;
        }
        if entry.is_symlink() {
            return Err(ProjectFileError::corrupt("archive contains links"));
        }
        let Some(name) = entry.enclosed_name().as_deref().and_then(member_name) else {
            return Err(ProjectFileError::corrupt(format!(
                "archive entry has unsafe path {}",
                entry.name()
            )));
        };
        if entry.size() > MAX_MEMBER_SIZE {
            return Err(ProjectFileError::corrupt(format!(
                "{name} is {} bytes uncompressed",
                entry.size()
            )));
        }
        let mut data = Vec::new();
        entry
            .by_ref()
            .take(MAX_MEMBER_SIZE + 1)
            .read_to_end(&mut data)
            .map_err(|error| ProjectFileError::corrupt(format!("truncated {name}: {error}")))?;
        if data.len() as u64 > MAX_MEMBER_SIZE {
            return Err(ProjectFileError::corrupt(format!("{name} exceeds its stated size")));
        }
        members.insert(name, data);
    }
    Ok(members)
}

fn zip_failure(context: impl Into<String>, error: ZipError) -> ProjectFileError {
    match error {
        ZipError::Io(source) => ProjectFileError::io(context, source),
        other => ProjectFileError::io(context, std::io::Error::other(other)),
    }
}

/// Normalized relative member name, or `None` for absolute or escaping paths.
fn member_name(path: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?.to_owned()),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn members_survive_pack_and_unpack() {
        let mut members = Members::new();
        members.insert("manifest.json".to_owned(), b"{}".to_vec());
        members.insert("layers/layer_1.png".to_owned(), vec![1, 2, 3]);
        let bytes = pack(&members).expect("pack members");
        assert_eq!(&bytes[..4], b"PK\x03\x04");
        assert_eq!(unpack(&bytes).expect("unpack members"), members);
    }

    #[test]
    fn non_zip_input_is_corrupt() {
        let error = unpack(b"definitely not a package").expect_err("garbage input");
        assert!(matches!(error, ProjectFileError::CorruptPackage { .. }));
    }

    #[test]
    fn directories_are_skipped_and_escaping_entries_rejected() {
        let options = SimpleFileOptions::default();
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer.add_directory("layers/", options).expect("add directory");
        writer.start_file("./layers/layer_0.png", options).expect("start file");
        writer.write_all(b"png").expect("write member");
        let bytes = writer.finish().expect("finish archive").into_inner();
        let members = unpack(&bytes).expect("unpack members");
        assert_eq!(members.keys().collect::<Vec<_>>(), vec!["layers/layer_0.png"]);

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer.start_file("../escape.txt", options).expect("start file");
        writer.write_all(b"x").expect("write member");
        let bytes = writer.finish().expect("finish archive").into_inner();
        let error = unpack(&bytes).expect_err("escaping entry");
        assert!(matches!(error, ProjectFileError::CorruptPackage { .. }));
    }

    #[test]
    fn member_names_are_normalized_and_confined() {
        assert_eq!(
            member_name(Path::new("./layers/layer_0.png")).as_deref(),
            Some("layers/layer_0.png")
        );
        assert_eq!(member_name(Path::new("../escape.png")), None);
        assert_eq!(member_name(Path::new("/etc/passwd")), None);
    }
}
