//! Per-file cursors and chunk reading.
//!
//! The tracker owns the cursor table and the set of known reference ids. It
//! turns "everything after the cursor" into byte-budgeted chunks that always
//! end on a line boundary.

use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, trace, warn};

use super::extract;
use super::types::{
    Chunk, ChunkMetadata, FileKind, FileSnapshot, ServerFileState, SyncError, SyncResult,
    TrackedFile,
};
use crate::redact::RedactionEngine;

/// Per-line framing overhead counted against the chunk budget.
pub const LINE_OVERHEAD_BYTES: usize = 4;

/// Cursor table and reference registry for one session.
#[derive(Debug, Clone)]
pub struct FileTracker {
    dir: PathBuf,
    /// Root first, then transitive files in discovery order.
    files: Vec<TrackedFile>,
    known_refs: HashSet<String>,
}

impl FileTracker {
    /// Track `root_path` with an empty cursor.
    pub fn new(root_path: impl Into<PathBuf>) -> Self {
        let root_path = root_path.into();
        let dir = root_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

        Self {
            dir,
            files: vec![TrackedFile::new(root_path, FileKind::Root)],
            known_refs: HashSet::new(),
        }
    }

    #[must_use]
    pub fn root(&self) -> &TrackedFile {
        &self.files[0]
    }

    /// Directory holding the root and its transitive files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn files(&self) -> &[TrackedFile] {
        &self.files
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TrackedFile> {
        self.files.iter().find(|f| f.name == name)
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut TrackedFile> {
        self.files.iter_mut().find(|f| f.name == name)
    }

    #[must_use]
    pub fn is_known_reference(&self, id: &str) -> bool {
        self.known_refs.contains(id)
    }

    /// Last synced line per tracked file name.
    #[must_use]
    pub fn stats(&self) -> BTreeMap<String, u64> {
        self.files
            .iter()
            .map(|f| (f.name.clone(), f.last_synced_line))
            .collect()
    }

    /// Whether `file` may hold unsynced content.
    ///
    /// True when the file cannot be stat'ed, when the cursor sits before the
    /// end of the file, or when the mtime/size snapshot is missing or stale.
    #[must_use]
    pub fn has_file_changed(&self, file: &TrackedFile) -> bool {
        let Ok(metadata) = fs::metadata(&file.path) else {
            return true;
        };
        if file.byte_offset > 0 && file.byte_offset < metadata.len() {
            return true;
        }
        file.snapshot != Some(FileSnapshot::of(&metadata))
    }

    /// Read the next chunk of `name` after its cursor.
    ///
    /// Returns `Ok(None)` when there is nothing new. The cursor itself is not
    /// moved; call [`update_after_sync`](Self::update_after_sync) once the
    /// chunk has been accepted.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::LineTooLarge`] if the first pending line alone
    /// exceeds `max_bytes`, or an I/O error if the file cannot be read.
    pub fn read_chunk(
        &mut self,
        name: &str,
        redactor: Option<&RedactionEngine>,
        max_bytes: usize,
    ) -> SyncResult<Option<Chunk>> {
        let file = self.get(name).ok_or_else(|| {
            SyncError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{name} is not tracked"),
            ))
        })?;
        let path = file.path.clone();
        let kind = file.kind;
        let last_line = file.last_synced_line;
        let offset = file.byte_offset;

        let handle = File::open(&path)?;
        let opened = handle.metadata()?;
        let mut reader = BufReader::new(handle);
        let (start, settled) = position(&mut reader, name, last_line, offset, opened.len())?;

        let mut lines = Vec::new();
        let mut new_references = Vec::new();
        let mut metadata = (kind == FileKind::Root).then(ChunkMetadata::default);
        let mut budget_used = 0usize;
        let mut end_offset = start;
        let mut consumed = start;
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let read = reader.read_until(b'\n', &mut buf)?;
            if read == 0 {
                break;
            }
            let content = buf.strip_suffix(b"\n").unwrap_or(&buf[..]);
            let line_no = last_line + lines.len() as u64 + 1;

            if budget_used + content.len() + LINE_OVERHEAD_BYTES > max_bytes {
                if lines.is_empty() {
                    return Err(SyncError::LineTooLarge {
                        file: name.to_string(),
                        line: line_no,
                        size: content.len(),
                        max: max_bytes,
                    });
                }
                break;
            }
            budget_used += content.len() + LINE_OVERHEAD_BYTES;
            end_offset += content.len() as u64 + 1;
            consumed += read as u64;

            let text = String::from_utf8_lossy(content);
            if let Ok(value) = serde_json::from_str::<Value>(&text) {
                for id in extract::reference_ids(&value) {
                    if self.known_refs.insert(id.to_string()) {
                        new_references.push(id.to_string());
                    }
                }
                if let Some(meta) = metadata.as_mut() {
                    extract::absorb_line_metadata(meta, &value);
                }
            }

            lines.push(match redactor {
                Some(engine) => engine.redact_line(&text),
                None => text.into_owned(),
            });
        }

        if lines.is_empty() {
            trace!(file = name, line = last_line, "No new lines");
            // Caught up: keep the offset found by counting so idle passes skip the file.
            if settled {
                if let Some(file) = self.get_mut(name) {
                    file.byte_offset = start;
                    file.snapshot = Some(FileSnapshot::of(&opened));
                }
            }
            return Ok(None);
        }

        if end_offset != consumed {
            warn!(
                file = name,
                end_offset, consumed, "Chunk end offset does not match bytes read (unterminated last line?)"
            );
        }

        debug!(
            file = name,
            first_line = last_line + 1,
            lines = lines.len(),
            bytes = budget_used,
            new_refs = new_references.len(),
            "Read chunk"
        );

        Ok(Some(Chunk {
            file_name: name.to_string(),
            kind,
            first_line: last_line + 1,
            lines,
            end_offset,
            metadata: metadata.filter(|m| !m.is_empty()),
            new_references,
        }))
    }

    /// Advance the cursor of `name` after an accepted upload.
    pub fn update_after_sync(&mut self, name: &str, last_line: u64, byte_offset: u64) {
        let Some(file) = self.get_mut(name) else {
            warn!(file = name, "Cursor update for untracked file ignored");
            return;
        };
        file.last_synced_line = last_line;
        file.byte_offset = byte_offset;
        file.snapshot = fs::metadata(&file.path).ok().map(|m| FileSnapshot::of(&m));
    }

    /// Move the cursor of `name` to a line whose byte offset is unknown.
    ///
    /// The snapshot is dropped so the file is read again on the next pass.
    pub fn reset_cursor(&mut self, name: &str, last_line: u64) {
        if let Some(file) = self.get_mut(name) {
            file.last_synced_line = last_line;
            file.byte_offset = 0;
            file.snapshot = None;
        }
    }

    /// Merge `new_ids` into the known set and register every known id whose
    /// file now exists on disk.
    ///
    /// Returns the newly registered files.
    pub fn discover_new_files<I>(&mut self, new_ids: I) -> Vec<TrackedFile>
    where
        I: IntoIterator<Item = String>,
    {
        self.known_refs
            .extend(new_ids.into_iter().filter(|id| extract::is_valid_reference_id(id)));

        let mut ids: Vec<&String> = self.known_refs.iter().collect();
        ids.sort();

        let found: Vec<TrackedFile> = ids
            .into_iter()
            .map(|id| extract::transitive_file_name(id))
            .filter(|name| self.get(name).is_none())
            .map(|name| self.dir.join(name))
            .filter(|path| path.is_file())
            .map(|path| TrackedFile::new(path, FileKind::Transitive))
            .collect();

        for file in &found {
            debug!(file = %file.name, "Discovered transitive file");
        }
        self.files.extend(found.iter().cloned());
        found
    }

    /// Replace the cursor table with the backend's view.
    ///
    /// Every reported file is tracked at the reported line with an unknown
    /// byte offset, except where the local cursor already agrees. The root is
    /// always tracked.
    pub fn seed(&mut self, server_files: &BTreeMap<String, ServerFileState>) {
        let previous = std::mem::take(&mut self.files);
        let root = previous[0].clone();
        let reseed = |path: PathBuf, kind: FileKind, line: u64| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            match previous.iter().find(|f| f.name == name) {
                Some(local) if local.last_synced_line == line => TrackedFile {
                    kind,
                    ..local.clone()
                },
                _ => TrackedFile::at_line(path, kind, line),
            }
        };

        let root_line = server_files
            .get(&root.name)
            .map_or(0, |state| state.last_synced_line);
        let mut files = vec![reseed(root.path.clone(), FileKind::Root, root_line)];

        for (name, state) in server_files {
            if *name == root.name {
                continue;
            }
            // Only bare file names are meaningful here.
            if Path::new(name).file_name().and_then(|n| n.to_str()) != Some(name.as_str()) {
                warn!(file = %name, "Ignoring backend file entry that is not a plain file name");
                continue;
            }
            if let Some(id) = extract::reference_id_from_file_name(name) {
                self.known_refs.insert(id.to_string());
            }
            files.push(reseed(
                self.dir.join(name),
                FileKind::Transitive,
                state.last_synced_line,
            ));
        }

        debug!(files = files.len(), "Seeded cursors from backend");
        self.files = files;
    }
}

/// Position `reader` right after line `last_line` and return that offset.
///
/// A known offset is trusted when it lies within the file; otherwise lines are
/// counted from the start. The flag is true when the offset is known to sit
/// on the boundary right after line `last_line`.
fn position(
    reader: &mut BufReader<File>,
    name: &str,
    last_line: u64,
    offset: u64,
    size: u64,
) -> io::Result<(u64, bool)> {
    if last_line == 0 {
        return Ok((0, true));
    }

    if offset > 0 {
        if offset <= size {
            match reader.seek(SeekFrom::Start(offset)) {
                Ok(pos) => return Ok((pos, true)),
                Err(err) => warn!(file = name, offset, error = %err, "Seek failed, counting lines"),
            }
        } else {
            warn!(file = name, offset, size, "Cursor beyond end of file, counting lines");
        }
        reader.seek(SeekFrom::Start(0))?;
    }

    let mut skipped = 0u64;
    let mut pos = 0u64;
    let mut buf = Vec::new();
    while skipped < last_line {
        buf.clear();
        let read = reader.read_until(b'\n', &mut buf)?;
        if read == 0 {
            break;
        }
        pos += read as u64;
        skipped += 1;
    }
    trace!(file = name, skipped, offset = pos, "Skip-counted to cursor");
    // Short files and unterminated last lines leave the boundary unknown.
    Ok((pos, skipped == last_line && buf.ends_with(b"\n")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redact::RedactionPattern;
    use std::io::Write;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn append(path: &Path, content: &str) {
        let mut file = fs::OpenOptions::new().append(true).open(path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    /// Read chunks until exhausted, advancing the cursor like the engine does.
    fn drain(tracker: &mut FileTracker, name: &str, max: usize) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        while let Some(chunk) = tracker.read_chunk(name, None, max).unwrap() {
            tracker.update_after_sync(name, chunk.last_line(), chunk.end_offset);
            chunks.push(chunk);
        }
        chunks
    }

    #[test]
    fn test_read_chunk_whole_file() {
        let temp_dir = TempDir::new().unwrap();
        let root = write(temp_dir.path(), "s.jsonl", "{\"a\":1}\n{\"b\":2}\n");
        let mut tracker = FileTracker::new(&root);

        let chunk = tracker.read_chunk("s.jsonl", None, 1024).unwrap().unwrap();
        assert_eq!(chunk.first_line, 1);
        assert_eq!(chunk.lines, vec!["{\"a\":1}", "{\"b\":2}"]);
        assert_eq!(chunk.end_offset, 16);
        assert_eq!(chunk.kind, FileKind::Root);
    }

    #[test]
    fn test_resume_is_line_exact_across_appends() {
        let temp_dir = TempDir::new().unwrap();
        let root = write(temp_dir.path(), "s.jsonl", "{\"n\":1}\n{\"n\":2}\n");
        let mut tracker = FileTracker::new(&root);

        let chunks = drain(&mut tracker, "s.jsonl", 1024);
        assert_eq!(chunks.len(), 1);
        assert!(!tracker.has_file_changed(tracker.root()));
        assert!(tracker.read_chunk("s.jsonl", None, 1024).unwrap().is_none());

        append(&root, "{\"n\":3}\n");
        assert!(tracker.has_file_changed(tracker.root()));
        let chunks = drain(&mut tracker, "s.jsonl", 1024);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].first_line, 3);
        assert_eq!(chunks[0].lines, vec!["{\"n\":3}"]);
        assert_eq!(tracker.root().byte_offset, 24);
        assert_eq!(tracker.root().last_synced_line, 3);
    }

    #[test]
    fn test_budget_splits_into_contiguous_chunks() {
        let temp_dir = TempDir::new().unwrap();
        let content: String = (1..=10).map(|n| format!("{{\"n\":{n:02}}}\n")).collect();
        let root = write(temp_dir.path(), "s.jsonl", &content);
        let mut tracker = FileTracker::new(&root);

        // Each line is 8 bytes + 4 overhead; 30 bytes fits two lines.
        let chunks = drain(&mut tracker, "s.jsonl", 30);
        assert_eq!(chunks.len(), 5);

        let mut expected_first = 1;
        let mut rebuilt = String::new();
        for chunk in &chunks {
            assert_eq!(chunk.first_line, expected_first);
            assert_eq!(chunk.lines.len(), 2);
            expected_first = chunk.last_line() + 1;
            for line in &chunk.lines {
                rebuilt.push_str(line);
                rebuilt.push('\n');
            }
        }
        assert_eq!(rebuilt, content);
        assert_eq!(tracker.root().byte_offset, content.len() as u64);
    }

    #[test]
    fn test_budget_boundary_is_inclusive() {
        let temp_dir = TempDir::new().unwrap();
        let root = write(temp_dir.path(), "s.jsonl", "123456\n");
        let mut tracker = FileTracker::new(&root);
        assert!(tracker.read_chunk("s.jsonl", None, 10).unwrap().is_some());
        assert!(matches!(
            tracker.read_chunk("s.jsonl", None, 9),
            Err(SyncError::LineTooLarge { line: 1, size: 6, max: 9, .. })
        ));
    }

    #[test]
    fn test_oversize_line_names_the_line() {
        let temp_dir = TempDir::new().unwrap();
        let long = "x".repeat(100);
        let root = write(temp_dir.path(), "s.jsonl", &format!("{{}}\n{long}\n"));
        let mut tracker = FileTracker::new(&root);

        let chunk = tracker.read_chunk("s.jsonl", None, 50).unwrap().unwrap();
        assert_eq!(chunk.lines.len(), 1);
        tracker.update_after_sync("s.jsonl", chunk.last_line(), chunk.end_offset);

        let err = tracker.read_chunk("s.jsonl", None, 50).unwrap_err();
        assert!(matches!(err, SyncError::LineTooLarge { line: 2, size: 100, .. }));
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_skip_count_when_offset_unknown() {
        let temp_dir = TempDir::new().unwrap();
        let root = write(temp_dir.path(), "s.jsonl", "{\"n\":1}\n{\"n\":2}\n{\"n\":3}\n");
        let mut tracker = FileTracker::new(&root);
        tracker.reset_cursor("s.jsonl", 2);

        let chunk = tracker.read_chunk("s.jsonl", None, 1024).unwrap().unwrap();
        assert_eq!(chunk.first_line, 3);
        assert_eq!(chunk.lines, vec!["{\"n\":3}"]);
        assert_eq!(chunk.end_offset, 24);
    }

    #[test]
    fn test_caught_up_skip_count_records_offset() {
        let temp_dir = TempDir::new().unwrap();
        let root = write(temp_dir.path(), "s.jsonl", "{\"n\":1}\n{\"n\":2}\n");
        let mut tracker = FileTracker::new(&root);
        let server: BTreeMap<String, ServerFileState> =
            [("s.jsonl".to_string(), ServerFileState { last_synced_line: 2 })]
                .into_iter()
                .collect();
        tracker.seed(&server);
        assert!(tracker.has_file_changed(tracker.root()));

        assert!(tracker.read_chunk("s.jsonl", None, 1024).unwrap().is_none());
        assert_eq!(tracker.root().byte_offset, 16);
        assert_eq!(tracker.root().last_synced_line, 2);
        assert!(!tracker.has_file_changed(tracker.root()));

        append(&root, "{\"n\":3}\n");
        let chunk = tracker.read_chunk("s.jsonl", None, 1024).unwrap().unwrap();
        assert_eq!(chunk.first_line, 3);
        assert_eq!(chunk.lines, vec!["{\"n\":3}"]);
    }

    #[test]
    fn test_short_file_keeps_offset_unknown() {
        let temp_dir = TempDir::new().unwrap();
        let root = write(temp_dir.path(), "s.jsonl", "{\"n\":1}\n");
        let mut tracker = FileTracker::new(&root);
        tracker.reset_cursor("s.jsonl", 3);

        assert!(tracker.read_chunk("s.jsonl", None, 1024).unwrap().is_none());
        assert_eq!(tracker.root().byte_offset, 0);
        assert!(tracker.root().snapshot.is_none());
    }

    #[test]
    fn test_offset_beyond_size_falls_back_to_counting() {
        let temp_dir = TempDir::new().unwrap();
        let root = write(temp_dir.path(), "s.jsonl", "{\"n\":1}\n{\"n\":2}\n");
        let mut tracker = FileTracker::new(&root);
        tracker.update_after_sync("s.jsonl", 1, 10_000);

        let chunk = tracker.read_chunk("s.jsonl", None, 1024).unwrap().unwrap();
        assert_eq!(chunk.first_line, 2);
        assert_eq!(chunk.lines, vec!["{\"n\":2}"]);
        assert_eq!(chunk.end_offset, 16);
    }

    #[test]
    fn test_unterminated_last_line_is_included() {
        let temp_dir = TempDir::new().unwrap();
        let root = write(temp_dir.path(), "s.jsonl", "{\"n\":1}\n{\"n\":2}");
        let mut tracker = FileTracker::new(&root);

        let chunk = tracker.read_chunk("s.jsonl", None, 1024).unwrap().unwrap();
        assert_eq!(chunk.lines.len(), 2);
        // Accumulated offset counts a terminator for every line.
        assert_eq!(chunk.end_offset, 16);
    }

    #[test]
    fn test_changed_predicate() {
        let temp_dir = TempDir::new().unwrap();
        let root = write(temp_dir.path(), "s.jsonl", "{}\n");
        let mut tracker = FileTracker::new(&root);
        // No snapshot yet.
        assert!(tracker.has_file_changed(tracker.root()));

        tracker.update_after_sync("s.jsonl", 1, 3);
        assert!(!tracker.has_file_changed(tracker.root()));

        let missing = TrackedFile::new(temp_dir.path().join("gone.jsonl"), FileKind::Transitive);
        assert!(tracker.has_file_changed(&missing));
    }

    #[test]
    fn test_references_and_metadata_extraction() {
        let temp_dir = TempDir::new().unwrap();
        let root = write(
            temp_dir.path(),
            "s.jsonl",
            concat!(
                "{\"type\":\"user\",\"gitBranch\":\"feat/x\",\"cwd\":\"/w\",\"toolUseResult\":{\"agentId\":\"a1\"}}\n",
                "{\"toolUseResult\":{\"agentId\":\"a1\"}}\n",
                "{\"toolUseResult\":{\"agentId\":\"b2\"}}\n",
                "not json at all\n",
            ),
        );
        let mut tracker = FileTracker::new(&root);

        let chunk = tracker.read_chunk("s.jsonl", None, 4096).unwrap().unwrap();
        assert_eq!(chunk.new_references, vec!["a1".to_string(), "b2".to_string()]);
        let meta = chunk.metadata.unwrap();
        assert_eq!(meta.git_branch.as_deref(), Some("feat/x"));
        assert_eq!(meta.cwd.as_deref(), Some("/w"));
        assert!(tracker.is_known_reference("a1"));

        // Already known ids are not announced twice.
        let chunk = tracker.read_chunk("s.jsonl", None, 4096).unwrap().unwrap();
        assert!(chunk.new_references.is_empty());
    }

    #[test]
    fn test_transitive_chunks_carry_no_metadata() {
        let temp_dir = TempDir::new().unwrap();
        let root = write(temp_dir.path(), "s.jsonl", "");
        write(temp_dir.path(), "agent-a.jsonl", "{\"gitBranch\":\"main\"}\n");
        let mut tracker = FileTracker::new(&root);
        tracker.discover_new_files(vec!["a".to_string()]);

        let chunk = tracker.read_chunk("agent-a.jsonl", None, 4096).unwrap().unwrap();
        assert_eq!(chunk.kind, FileKind::Transitive);
        assert!(chunk.metadata.is_none());
    }

    #[test]
    fn test_redaction_runs_after_extraction() {
        let temp_dir = TempDir::new().unwrap();
        let root = write(
            temp_dir.path(),
            "s.jsonl",
            "{\"agentId\":\"sk1\",\"text\":\"key sk1\"}\n",
        );
        let engine =
            RedactionEngine::compile(&[RedactionPattern::value("k", r"sk1", "key")]).unwrap();
        let mut tracker = FileTracker::new(&root);

        let chunk = tracker.read_chunk("s.jsonl", Some(&engine), 4096).unwrap().unwrap();
        assert_eq!(chunk.new_references, vec!["sk1".to_string()]);
        assert_eq!(
            chunk.lines,
            vec!["{\"agentId\":\"[REDACTED:KEY]\",\"text\":\"key [REDACTED:KEY]\"}"]
        );
    }

    #[test]
    fn test_discover_waits_for_file_to_exist() {
        let temp_dir = TempDir::new().unwrap();
        let root = write(temp_dir.path(), "s.jsonl", "");
        let mut tracker = FileTracker::new(&root);

        assert!(tracker.discover_new_files(vec!["late".to_string()]).is_empty());
        write(temp_dir.path(), "agent-late.jsonl", "{}\n");

        let found = tracker.discover_new_files(Vec::new());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "agent-late.jsonl");
        assert_eq!(found[0].kind, FileKind::Transitive);
        assert!(tracker.discover_new_files(Vec::new()).is_empty());
    }

    #[test]
    fn test_discover_rejects_unsafe_ids() {
        let temp_dir = TempDir::new().unwrap();
        let root = write(temp_dir.path(), "s.jsonl", "");
        let mut tracker = FileTracker::new(&root);
        assert!(tracker.discover_new_files(vec!["../s".to_string()]).is_empty());
        assert!(!tracker.is_known_reference("../s"));
    }

    #[test]
    fn test_seed_replaces_table() {
        let temp_dir = TempDir::new().unwrap();
        let root = write(temp_dir.path(), "s.jsonl", "{}\n{}\n{}\n");
        write(temp_dir.path(), "agent-a.jsonl", "{}\n");
        let mut tracker = FileTracker::new(&root);
        tracker.update_after_sync("s.jsonl", 3, 9);
        tracker.discover_new_files(vec!["gone".to_string()]);

        let server: BTreeMap<String, ServerFileState> = [
            ("s.jsonl".to_string(), ServerFileState { last_synced_line: 3 }),
            ("agent-a.jsonl".to_string(), ServerFileState { last_synced_line: 1 }),
            ("../escape.jsonl".to_string(), ServerFileState { last_synced_line: 1 }),
        ]
        .into_iter()
        .collect();
        tracker.seed(&server);

        // Agreeing local cursor keeps its offset and snapshot.
        assert_eq!(tracker.root().byte_offset, 9);
        assert!(tracker.root().snapshot.is_some());

        let agent = tracker.get("agent-a.jsonl").unwrap();
        assert_eq!(agent.kind, FileKind::Transitive);
        assert_eq!(agent.last_synced_line, 1);
        assert_eq!(agent.byte_offset, 0);
        assert!(tracker.is_known_reference("a"));
        assert_eq!(tracker.files().len(), 2);
        assert!(tracker.is_known_reference("gone"));
    }

    #[test]
    fn test_seed_lower_cursor_rereads() {
        let temp_dir = TempDir::new().unwrap();
        let root = write(temp_dir.path(), "s.jsonl", "{\"n\":1}\n{\"n\":2}\n{\"n\":3}\n");
        let mut tracker = FileTracker::new(&root);
        drain(&mut tracker, "s.jsonl", 1024);

        let server: BTreeMap<String, ServerFileState> =
            [("s.jsonl".to_string(), ServerFileState { last_synced_line: 1 })]
                .into_iter()
                .collect();
        tracker.seed(&server);
        assert!(tracker.has_file_changed(tracker.root()));

        let chunk = tracker.read_chunk("s.jsonl", None, 1024).unwrap().unwrap();
        assert_eq!(chunk.first_line, 2);
        assert_eq!(chunk.lines.len(), 2);
    }

    #[test]
    fn test_seed_without_root_entry_resets_root() {
        let temp_dir = TempDir::new().unwrap();
        let root = write(temp_dir.path(), "s.jsonl", "{}\n");
        let mut tracker = FileTracker::new(&root);
        tracker.update_after_sync("s.jsonl", 1, 3);

        tracker.seed(&BTreeMap::new());
        assert_eq!(tracker.files().len(), 1);
        assert_eq!(tracker.root().last_synced_line, 0);
        assert_eq!(tracker.root().kind, FileKind::Root);
    }
}
