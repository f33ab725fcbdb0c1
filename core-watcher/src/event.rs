//! Semantic file events and their derivation from raw `notify` events.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use notify::event::{AccessKind, AccessMode, EventKind, ModifyKind, RenameMode};

/// Kind of change observed on a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileEventKind {
    Created,
    /// The path was renamed away; the new name arrives as `Created`.
    Renamed,
    Removed,
    Written,
    PermissionChanged,
}

impl FileEventKind {
    pub const ALL: [FileEventKind; 5] = [
        FileEventKind::Created,
        FileEventKind::Renamed,
        FileEventKind::Removed,
        FileEventKind::Written,
        FileEventKind::PermissionChanged,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FileEventKind::Created => "created",
            FileEventKind::Renamed => "renamed",
            FileEventKind::Removed => "removed",
            FileEventKind::Written => "written",
            FileEventKind::PermissionChanged => "permission_changed",
        }
    }
}

impl fmt::Display for FileEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable record of one observed change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub kind: FileEventKind,
    pub path: PathBuf,
    pub observed_at: DateTime<Utc>,
}

impl FileEvent {
    pub fn new(kind: FileEventKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
            observed_at: Utc::now(),
        }
    }
}

/// Semantic kind for a raw event, before any filesystem probing.
///
/// A rename reported as a `From`/`To` pair or as `Both` is split so the old
/// name yields `Renamed` once and the new name yields `Created`. Backends that
/// cannot tell the halves apart report `RenameMode::Any`, which is returned as
/// `Renamed` here and resolved by the dispatch loop against the filesystem.
pub fn classify(raw: &notify::Event) -> Vec<FileEvent> {
    let now = Utc::now();
    let make = |kind, path: &PathBuf| FileEvent {
        kind,
        path: path.clone(),
        observed_at: now,
    };

    match raw.kind {
        EventKind::Create(_) => raw
            .paths
            .iter()
            .map(|p| make(FileEventKind::Created, p))
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut events = Vec::with_capacity(2);
            if let Some(from) = raw.paths.first() {
                events.push(make(FileEventKind::Renamed, from));
            }
            if let Some(to) = raw.paths.get(1) {
                events.push(make(FileEventKind::Created, to));
            }
            events
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => raw
            .paths
            .iter()
            .map(|p| make(FileEventKind::Created, p))
            .collect(),
        EventKind::Modify(ModifyKind::Name(_)) => raw
            .paths
            .iter()
            .map(|p| make(FileEventKind::Renamed, p))
            .collect(),
        EventKind::Modify(ModifyKind::Metadata(_)) => raw
            .paths
            .iter()
            .map(|p| make(FileEventKind::PermissionChanged, p))
            .collect(),
        EventKind::Modify(_) | EventKind::Access(AccessKind::Close(AccessMode::Write)) => raw
            .paths
            .iter()
            .map(|p| make(FileEventKind::Written, p))
            .collect(),
        EventKind::Remove(_) => raw
            .paths
            .iter()
            .map(|p| make(FileEventKind::Removed, p))
            .collect(),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

/// True when the raw event carries an ambiguous rename half.
pub(crate) fn is_ambiguous_rename(raw: &notify::Event) -> bool {
    matches!(
        raw.kind,
        EventKind::Modify(ModifyKind::Name(RenameMode::Any | RenameMode::Other))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, MetadataKind, RemoveKind};

    fn raw(kind: EventKind, paths: &[&str]) -> notify::Event {
        let mut event = notify::Event::new(kind);
        for p in paths {
            event = event.add_path(PathBuf::from(p));
        }
        event
    }

    fn kinds(events: &[FileEvent]) -> Vec<(FileEventKind, PathBuf)> {
        events.iter().map(|e| (e.kind, e.path.clone())).collect()
    }

    #[test]
    fn test_create_and_remove() {
        let events = classify(&raw(EventKind::Create(CreateKind::File), &["/m/a.flac"]));
        assert_eq!(
            kinds(&events),
            vec![(FileEventKind::Created, PathBuf::from("/m/a.flac"))]
        );

        let events = classify(&raw(EventKind::Remove(RemoveKind::File), &["/m/a.flac"]));
        assert_eq!(events[0].kind, FileEventKind::Removed);
    }

    #[test]
    fn test_rename_pair_is_split() {
        let events = classify(&raw(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/m/old.flac", "/m/new.flac"],
        ));
        assert_eq!(
            kinds(&events),
            vec![
                (FileEventKind::Renamed, PathBuf::from("/m/old.flac")),
                (FileEventKind::Created, PathBuf::from("/m/new.flac")),
            ]
        );

        let from = classify(&raw(
            EventKind::Modify(ModifyKind::Name(RenameMode::From)),
            &["/m/old.flac"],
        ));
        assert_eq!(from[0].kind, FileEventKind::Renamed);

        let to = classify(&raw(
            EventKind::Modify(ModifyKind::Name(RenameMode::To)),
            &["/m/new.flac"],
        ));
        assert_eq!(to[0].kind, FileEventKind::Created);
    }

    #[test]
    fn test_write_and_metadata() {
        let events = classify(&raw(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &["/m/a.flac"],
        ));
        assert_eq!(events[0].kind, FileEventKind::Written);

        let events = classify(&raw(
            EventKind::Access(AccessKind::Close(AccessMode::Write)),
            &["/m/a.flac"],
        ));
        assert_eq!(events[0].kind, FileEventKind::Written);

        let events = classify(&raw(
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions)),
            &["/m/a.flac"],
        ));
        assert_eq!(events[0].kind, FileEventKind::PermissionChanged);
    }

    #[test]
    fn test_ignored_kinds() {
        assert!(classify(&raw(
            EventKind::Access(AccessKind::Open(AccessMode::Read)),
            &["/m/a.flac"]
        ))
        .is_empty());
        assert!(classify(&raw(EventKind::Other, &["/m"])).is_empty());
    }

    #[test]
    fn test_ambiguous_rename() {
        let event = raw(EventKind::Modify(ModifyKind::Name(RenameMode::Any)), &["/m/a"]);
        assert!(is_ambiguous_rename(&event));
        assert_eq!(classify(&event)[0].kind, FileEventKind::Renamed);
    }
}
