use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Error, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;
use tracing::instrument;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DocumentInfo {
    pub path: PathBuf,
    pub page_count: usize,
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone, Copy)]
pub struct RenderRequest {
    pub page_index: usize,
    pub scale: f32,
    pub dark_mode: bool,
}

impl Default for RenderRequest {
    fn default() -> Self {
        Self {
            page_index: 0,
            scale: 1.0,
            dark_mode: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Which boundary of a class's page range the next mark writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeEndpoint {
    Start,
    End,
}

impl RangeEndpoint {
    pub fn label(self) -> &'static str {
        match self {
            RangeEndpoint::Start => "start",
            RangeEndpoint::End => "end",
        }
    }
}

/// A recorded page range. Pages are 1-based in the persisted convention.
/// Either boundary may be absent; no ordering between them is enforced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<u32>,
}

impl PageRange {
    pub fn set(&mut self, endpoint: RangeEndpoint, page: u32) {
        match endpoint {
            RangeEndpoint::Start => self.start = Some(page),
            RangeEndpoint::End => self.end = Some(page),
        }
    }

    pub fn get(&self, endpoint: RangeEndpoint) -> Option<u32> {
        match endpoint {
            RangeEndpoint::Start => self.start,
            RangeEndpoint::End => self.end,
        }
    }
}

#[derive(Debug, ThisError, Clone, Copy, PartialEq, Eq)]
pub enum MarkError {
    #[error("class name must not be empty")]
    EmptyClassName,
    #[error("no document is open")]
    NoDocument,
}

/// The session-wide class name to page range mapping. Serializes as the flat
/// JSON object that gets persisted: keys are class names, values hold the
/// optional `start`/`end` page numbers. Entries are created on first mark and
/// never removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Marks {
    classes: BTreeMap<String, PageRange>,
}

impl Marks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        class_name: &str,
        endpoint: RangeEndpoint,
        page: u32,
    ) -> Result<(), MarkError> {
        if class_name.is_empty() {
            return Err(MarkError::EmptyClassName);
        }
        self.classes
            .entry(class_name.to_owned())
            .or_default()
            .set(endpoint, page);
        Ok(())
    }

    pub fn range(&self, class_name: &str) -> Option<&PageRange> {
        self.classes.get(class_name)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PageRange)> {
        self.classes.iter()
    }
}

pub trait DocumentBackend: Send + Sync {
    fn info(&self) -> &DocumentInfo;
    fn render_page(&self, request: RenderRequest) -> Result<RenderImage>;
}

#[async_trait::async_trait]
pub trait DocumentProvider: Send + Sync {
    async fn open(&self, path: &Path) -> Result<Arc<dyn DocumentBackend>>;
}

/// Destination-agnostic persistence seam for the marks mapping.
pub trait MarkStore: Send + Sync {
    fn load(&self, path: &Path) -> Result<Option<Marks>>;
    fn save(&self, path: &Path, marks: &Marks) -> Result<()>;
}

/// Writes the marks file as pretty JSON with 4-space indentation, the
/// persisted convention. The write goes through a temp file and a rename so
/// an interrupted save never leaves a truncated file behind.
#[derive(Debug, Default)]
pub struct FileMarkStore;

impl FileMarkStore {
    pub fn new() -> Self {
        Self
    }
}

fn marks_to_pretty_json(marks: &Marks) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    marks
        .serialize(&mut serializer)
        .context("failed to encode marks")?;
    Ok(buf)
}

impl MarkStore for FileMarkStore {
    fn load(&self, path: &Path) -> Result<Option<Marks>> {
        if !path.exists() {
            return Ok(None);
        }
        let mut file =
            File::open(path).with_context(|| format!("failed to open marks file {:?}", path))?;
        let mut buf = String::new();
        file.read_to_string(&mut buf)?;
        let marks = serde_json::from_str(&buf)
            .with_context(|| format!("failed to decode marks file {:?}", path))?;
        Ok(Some(marks))
    }

    fn save(&self, path: &Path, marks: &Marks) -> Result<()> {
        let payload = marks_to_pretty_json(marks)?;
        let tmp = path.with_extension("json.tmp");
        let mut file = File::create(&tmp)
            .with_context(|| format!("failed to open temp marks file {:?}", tmp))?;
        file.write_all(&payload)?;
        file.flush()?;
        fs::rename(tmp, path)?;
        Ok(())
    }
}

pub struct MemoryMarkStore {
    inner: Mutex<HashMap<PathBuf, Marks>>,
}

impl MemoryMarkStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryMarkStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkStore for MemoryMarkStore {
    fn load(&self, path: &Path) -> Result<Option<Marks>> {
        Ok(self.inner.lock().get(path).cloned())
    }

    fn save(&self, path: &Path, marks: &Marks) -> Result<()> {
        self.inner.lock().insert(path.to_path_buf(), marks.clone());
        Ok(())
    }
}

/// Paths discovered in one directory, filtered to the PDF extension.
/// Rebuilt wholesale on every scan.
#[derive(Debug, Clone, Default)]
pub struct FileListing {
    dir: Option<PathBuf>,
    entries: Vec<PathBuf>,
}

impl FileListing {
    pub fn scan(dir: &Path, sort: bool) -> Result<Self> {
        let mut entries = Vec::new();
        for entry in
            fs::read_dir(dir).with_context(|| format!("failed to read directory {:?}", dir))?
        {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            if has_pdf_extension(&path) {
                entries.push(path);
            }
        }
        if sort {
            entries.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        }
        Ok(Self {
            dir: Some(dir.to_path_buf()),
            entries,
        })
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&Path> {
        self.entries.get(index).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// Settings read from `config.toml` in the platform config directory.
/// A missing file means defaults; a malformed one is a startup error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scale: f32,
    pub dark_mode: bool,
    pub sort_listing: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scale: 1.0,
            dark_mode: false,
            sort_listing: true,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {:?}", path))?;
        let config =
            toml::from_str(&raw).with_context(|| format!("failed to parse config {:?}", path))?;
        Ok(config)
    }
}

/// The currently open document: its info, the render backend handle, and the
/// viewing state. A bounded render cache keeps pages near the current one.
pub struct OpenDocument {
    pub info: DocumentInfo,
    pub current_page: usize,
    pub scale: f32,
    pub dark_mode: bool,
    backend: Arc<dyn DocumentBackend>,
    render_cache: Mutex<HashMap<CacheKey, RenderImage>>,
}

impl OpenDocument {
    pub fn new(info: DocumentInfo, backend: Arc<dyn DocumentBackend>, config: &Config) -> Self {
        Self {
            info,
            current_page: 0,
            scale: config.scale,
            dark_mode: config.dark_mode,
            backend,
            render_cache: Mutex::new(HashMap::new()),
        }
    }

    /// 1-based number of the page currently shown, the persisted convention.
    pub fn current_page_number(&self) -> u32 {
        (self.current_page + 1) as u32
    }

    pub fn render(&self) -> Result<RenderImage> {
        self.render_with_scale(self.scale)
    }

    pub fn render_with_scale(&self, scale: f32) -> Result<RenderImage> {
        self.render_page_internal(self.current_page, scale, self.dark_mode, self.current_page)
    }

    pub fn prefetch_neighbors(&self, range: usize, scale: f32) -> Result<()> {
        if range == 0 {
            return Ok(());
        }

        let current_page = self.current_page;
        let dark_mode = self.dark_mode;
        let mut last_error: Option<Error> = None;

        for offset in 1..=range {
            if let Some(prev) = current_page.checked_sub(offset) {
                if let Err(err) = self.render_page_internal(prev, scale, dark_mode, current_page) {
                    last_error = Some(err);
                }
            }

            let next = current_page + offset;
            if next < self.info.page_count {
                if let Err(err) = self.render_page_internal(next, scale, dark_mode, current_page) {
                    last_error = Some(err);
                }
            }
        }

        if let Some(err) = last_error {
            Err(err)
        } else {
            Ok(())
        }
    }

    fn render_page_internal(
        &self,
        page_index: usize,
        scale: f32,
        dark_mode: bool,
        reference_page: usize,
    ) -> Result<RenderImage> {
        if page_index >= self.info.page_count {
            return Err(anyhow!("page {} out of range", page_index));
        }

        let key = CacheKey::new(page_index, scale, dark_mode);
        if let Some(image) = self.try_get_cached(&key) {
            return Ok(image);
        }

        let request = RenderRequest {
            page_index,
            scale,
            dark_mode,
        };
        let image = self.backend.render_page(request)?;
        self.store_cached_render(key, &image, reference_page);
        Ok(image)
    }

    fn try_get_cached(&self, key: &CacheKey) -> Option<RenderImage> {
        self.render_cache.lock().get(key).cloned()
    }

    fn store_cached_render(&self, key: CacheKey, image: &RenderImage, reference_page: usize) {
        let mut cache = self.render_cache.lock();
        cache.insert(key, image.clone());

        if cache.len() > CACHE_CAPACITY {
            let mut keys: Vec<_> = cache.keys().cloned().collect();
            keys.sort_by_key(|k| k.distance(reference_page));
            for stale in keys.into_iter().skip(CACHE_CAPACITY) {
                cache.remove(&stale);
            }
        }
    }
}

const CACHE_CAPACITY: usize = 10;

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
struct CacheKey {
    page_index: usize,
    scale_milli: u32,
    dark_mode: bool,
}

impl CacheKey {
    fn new(page_index: usize, scale: f32, dark_mode: bool) -> Self {
        Self {
            page_index,
            scale_milli: quantize_scale(scale),
            dark_mode,
        }
    }

    fn distance(&self, reference_page: usize) -> usize {
        self.page_index.abs_diff(reference_page)
    }
}

fn quantize_scale(scale: f32) -> u32 {
    let scaled = (scale * 1000.0).round();
    if !scaled.is_finite() || scaled <= 0.0 {
        1
    } else if scaled > u32::MAX as f32 {
        u32::MAX
    } else {
        scaled as u32
    }
}

/// Whether a document is open. Navigation and marking are only reachable in
/// the `Open` state, replacing scattered "is a file loaded" checks.
pub enum DocumentState {
    NoDocument,
    Open(OpenDocument),
}

impl DocumentState {
    pub fn open(&self) -> Option<&OpenDocument> {
        match self {
            DocumentState::Open(doc) => Some(doc),
            DocumentState::NoDocument => None,
        }
    }

    pub fn open_mut(&mut self) -> Option<&mut OpenDocument> {
        match self {
            DocumentState::Open(doc) => Some(doc),
            DocumentState::NoDocument => None,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, DocumentState::Open(_))
    }
}

#[derive(Debug, Clone)]
pub enum Command {
    NextPage { count: usize },
    PrevPage { count: usize },
    GotoPage { page: usize },
    ScaleBy { factor: f32 },
    ResetScale,
    ToggleDarkMode,
    SelectEndpoint { endpoint: RangeEndpoint },
    SetClassName { name: String },
    MarkPage,
    SaveMarks { path: PathBuf },
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    DocumentOpened(PathBuf),
    RedrawNeeded,
    MarkRecorded {
        class_name: String,
        endpoint: RangeEndpoint,
        page: u32,
    },
    MarkRejected(MarkError),
    MarksSaved(PathBuf),
    ListingChanged,
}

/// The annotation session: one open document at most, the marks accumulated
/// so far in this run, and the directory listing. Marks survive document
/// switches; only process restart clears them.
pub struct Session {
    document: DocumentState,
    marks: Marks,
    listing: FileListing,
    class_name: String,
    endpoint: RangeEndpoint,
    config: Config,
    store: Arc<dyn MarkStore>,
    events: Arc<Mutex<Vec<SessionEvent>>>,
}

impl Session {
    pub fn new(store: Arc<dyn MarkStore>, config: Config) -> Self {
        Self {
            document: DocumentState::NoDocument,
            marks: Marks::new(),
            listing: FileListing::default(),
            class_name: String::new(),
            endpoint: RangeEndpoint::Start,
            config,
            store,
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn events(&self) -> Arc<Mutex<Vec<SessionEvent>>> {
        Arc::clone(&self.events)
    }

    pub fn document(&self) -> &DocumentState {
        &self.document
    }

    pub fn open_document(&self) -> Option<&OpenDocument> {
        self.document.open()
    }

    pub fn marks(&self) -> &Marks {
        &self.marks
    }

    pub fn listing(&self) -> &FileListing {
        &self.listing
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn endpoint(&self) -> RangeEndpoint {
        self.endpoint
    }

    /// Opens `path` through the provider, replacing any current document and
    /// resetting to page 0. On failure the session is left untouched and the
    /// error is returned for the caller to surface.
    #[instrument(skip(self, provider))]
    pub async fn open_with<P: DocumentProvider>(
        &mut self,
        provider: &P,
        path: PathBuf,
    ) -> Result<()> {
        let backend = provider.open(&path).await?;
        let info = backend.info().clone();
        self.document = DocumentState::Open(OpenDocument::new(info, backend, &self.config));
        self.push_event(SessionEvent::DocumentOpened(path));
        self.push_event(SessionEvent::RedrawNeeded);
        Ok(())
    }

    /// Replaces the listing with the PDF entries of `dir`. The listing is
    /// unchanged when the directory cannot be read.
    pub fn scan_directory(&mut self, dir: &Path) -> Result<()> {
        self.listing = FileListing::scan(dir, self.config.sort_listing)?;
        self.push_event(SessionEvent::ListingChanged);
        Ok(())
    }

    pub fn listing_entry(&self, index: usize) -> Option<PathBuf> {
        self.listing.get(index).map(Path::to_path_buf)
    }

    pub fn set_class_name(&mut self, name: String) {
        self.class_name = name;
    }

    /// Records `current page + 1` as the chosen boundary of `class_name`'s
    /// range. Rejected without touching state when no document is open or
    /// the class name is empty.
    pub fn mark_page(
        &mut self,
        class_name: &str,
        endpoint: RangeEndpoint,
    ) -> Result<u32, MarkError> {
        let page = match self.document.open() {
            Some(doc) => doc.current_page_number(),
            None => return Err(MarkError::NoDocument),
        };
        self.marks.record(class_name, endpoint, page)?;
        self.push_event(SessionEvent::MarkRecorded {
            class_name: class_name.to_owned(),
            endpoint,
            page,
        });
        Ok(page)
    }

    pub fn save_marks(&self, path: &Path) -> Result<()> {
        self.store.save(path, &self.marks)?;
        self.push_event(SessionEvent::MarksSaved(path.to_path_buf()));
        Ok(())
    }

    pub fn apply(&mut self, command: Command) -> Result<()> {
        match command {
            Command::NextPage { count } => {
                if let Some(doc) = self.document.open_mut() {
                    let next = (doc.current_page + count).min(doc.info.page_count.saturating_sub(1));
                    if next != doc.current_page {
                        doc.current_page = next;
                        self.push_event(SessionEvent::RedrawNeeded);
                    }
                }
            }
            Command::PrevPage { count } => {
                if let Some(doc) = self.document.open_mut() {
                    let next = doc.current_page.saturating_sub(count);
                    if next != doc.current_page {
                        doc.current_page = next;
                        self.push_event(SessionEvent::RedrawNeeded);
                    }
                }
            }
            Command::GotoPage { page } => {
                if let Some(doc) = self.document.open_mut() {
                    let next = page.min(doc.info.page_count.saturating_sub(1));
                    if next != doc.current_page {
                        doc.current_page = next;
                        self.push_event(SessionEvent::RedrawNeeded);
                    }
                }
            }
            Command::ScaleBy { factor } => {
                if let Some(doc) = self.document.open_mut() {
                    let scale = (doc.scale * factor).clamp(0.25, 4.0);
                    if (doc.scale - scale).abs() > f32::EPSILON {
                        doc.scale = scale;
                        self.push_event(SessionEvent::RedrawNeeded);
                    }
                }
            }
            Command::ResetScale => {
                if let Some(doc) = self.document.open_mut() {
                    if (doc.scale - 1.0).abs() > f32::EPSILON {
                        doc.scale = 1.0;
                        self.push_event(SessionEvent::RedrawNeeded);
                    }
                }
            }
            Command::ToggleDarkMode => {
                if let Some(doc) = self.document.open_mut() {
                    doc.dark_mode = !doc.dark_mode;
                    self.push_event(SessionEvent::RedrawNeeded);
                }
            }
            Command::SelectEndpoint { endpoint } => {
                if self.endpoint != endpoint {
                    self.endpoint = endpoint;
                    self.push_event(SessionEvent::RedrawNeeded);
                }
            }
            Command::SetClassName { name } => {
                if self.class_name != name {
                    self.class_name = name;
                    self.push_event(SessionEvent::RedrawNeeded);
                }
            }
            Command::MarkPage => {
                let class_name = self.class_name.clone();
                let endpoint = self.endpoint;
                if let Err(err) = self.mark_page(&class_name, endpoint) {
                    tracing::warn!(%err, "mark rejected");
                    self.push_event(SessionEvent::MarkRejected(err));
                }
            }
            Command::SaveMarks { path } => {
                self.save_marks(&path)?;
            }
        }
        Ok(())
    }

    fn push_event(&self, event: SessionEvent) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use tempfile::tempdir;

    struct FakeBackend {
        info: DocumentInfo,
    }

    impl DocumentBackend for FakeBackend {
        fn info(&self) -> &DocumentInfo {
            &self.info
        }

        fn render_page(&self, request: RenderRequest) -> Result<RenderImage> {
            Ok(RenderImage {
                width: 1,
                height: 1,
                pixels: vec![request.page_index as u8],
            })
        }
    }

    struct FakeProvider {
        page_count: usize,
    }

    #[async_trait::async_trait]
    impl DocumentProvider for FakeProvider {
        async fn open(&self, path: &Path) -> Result<Arc<dyn DocumentBackend>> {
            let info = DocumentInfo {
                path: path.to_path_buf(),
                page_count: self.page_count,
                metadata: DocumentMetadata::default(),
            };
            Ok(Arc::new(FakeBackend { info }))
        }
    }

    fn session_with_store(store: Arc<dyn MarkStore>) -> Session {
        Session::new(store, Config::default())
    }

    fn session() -> Session {
        session_with_store(Arc::new(MemoryMarkStore::new()))
    }

    async fn open_pages(session: &mut Session, pages: usize) {
        let provider = FakeProvider { page_count: pages };
        session
            .open_with(&provider, PathBuf::from("/tmp/example.pdf"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn navigation_clamps_to_document_bounds() {
        let mut session = session();
        open_pages(&mut session, 3).await;

        session.apply(Command::NextPage { count: 1 }).unwrap();
        session.apply(Command::NextPage { count: 1 }).unwrap();
        assert_eq!(session.open_document().unwrap().current_page, 2);
        session.apply(Command::NextPage { count: 1 }).unwrap();
        assert_eq!(session.open_document().unwrap().current_page, 2);

        session.apply(Command::PrevPage { count: 5 }).unwrap();
        assert_eq!(session.open_document().unwrap().current_page, 0);

        session.apply(Command::GotoPage { page: 99 }).unwrap();
        assert_eq!(session.open_document().unwrap().current_page, 2);
    }

    #[test]
    fn navigation_without_document_is_a_noop() {
        let mut session = session();
        session.apply(Command::NextPage { count: 1 }).unwrap();
        session.apply(Command::PrevPage { count: 1 }).unwrap();
        assert!(!session.document().is_open());
        assert!(session.events().lock().is_empty());
    }

    #[tokio::test]
    async fn marking_records_one_based_pages() {
        let mut session = session();
        open_pages(&mut session, 3).await;

        session.mark_page("Algebra", RangeEndpoint::Start).unwrap();
        session.apply(Command::GotoPage { page: 2 }).unwrap();
        session.mark_page("Algebra", RangeEndpoint::End).unwrap();

        let range = session.marks().range("Algebra").unwrap();
        assert_eq!(range.start, Some(1));
        assert_eq!(range.end, Some(3));
    }

    #[tokio::test]
    async fn marking_one_endpoint_preserves_the_sibling() {
        let mut session = session();
        open_pages(&mut session, 10).await;

        session.apply(Command::GotoPage { page: 4 }).unwrap();
        session.mark_page("History", RangeEndpoint::End).unwrap();
        session.apply(Command::GotoPage { page: 1 }).unwrap();
        session.mark_page("History", RangeEndpoint::Start).unwrap();

        let range = session.marks().range("History").unwrap();
        assert_eq!(range.start, Some(2));
        assert_eq!(range.end, Some(5));
    }

    #[tokio::test]
    async fn empty_class_name_is_rejected_without_touching_marks() {
        let mut session = session();
        open_pages(&mut session, 3).await;

        let err = session.mark_page("", RangeEndpoint::Start).unwrap_err();
        assert_eq!(err, MarkError::EmptyClassName);
        assert!(session.marks().is_empty());
    }

    #[test]
    fn marking_without_document_is_rejected() {
        let mut session = session();
        let err = session.mark_page("Algebra", RangeEndpoint::Start).unwrap_err();
        assert_eq!(err, MarkError::NoDocument);
        assert!(session.marks().is_empty());
    }

    #[tokio::test]
    async fn mark_page_command_uses_selected_endpoint_and_class() {
        let mut session = session();
        open_pages(&mut session, 3).await;

        session
            .apply(Command::SetClassName {
                name: "Geometry".to_owned(),
            })
            .unwrap();
        session
            .apply(Command::SelectEndpoint {
                endpoint: RangeEndpoint::End,
            })
            .unwrap();
        session.apply(Command::MarkPage).unwrap();

        let range = session.marks().range("Geometry").unwrap();
        assert_eq!(range.end, Some(1));
        assert_eq!(range.start, None);
    }

    #[tokio::test]
    async fn marks_survive_a_document_switch() {
        let mut session = session();
        open_pages(&mut session, 3).await;
        session.mark_page("Algebra", RangeEndpoint::Start).unwrap();

        let provider = FakeProvider { page_count: 7 };
        session
            .open_with(&provider, PathBuf::from("/tmp/other.pdf"))
            .await
            .unwrap();

        assert_eq!(session.open_document().unwrap().current_page, 0);
        assert_eq!(session.open_document().unwrap().info.page_count, 7);
        assert_eq!(
            session.marks().range("Algebra").unwrap().start,
            Some(1)
        );
    }

    #[tokio::test]
    async fn save_then_load_round_trips_marks() {
        let store = Arc::new(MemoryMarkStore::new());
        let mut session = session_with_store(store.clone());
        open_pages(&mut session, 3).await;

        session.mark_page("Algebra", RangeEndpoint::Start).unwrap();
        session.apply(Command::GotoPage { page: 2 }).unwrap();
        session.mark_page("Algebra", RangeEndpoint::End).unwrap();

        let dest = PathBuf::from("/tmp/marks.json");
        session
            .apply(Command::SaveMarks { path: dest.clone() })
            .unwrap();

        let restored = store.load(&dest).unwrap().unwrap();
        assert_eq!(&restored, session.marks());
    }

    #[test]
    fn file_mark_store_writes_four_space_indented_json() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("marks.json");

        let mut marks = Marks::new();
        marks.record("Algebra", RangeEndpoint::Start, 1).unwrap();
        marks.record("Algebra", RangeEndpoint::End, 3).unwrap();

        let store = FileMarkStore::new();
        store.save(&dest, &marks).unwrap();

        let raw = std::fs::read_to_string(&dest).unwrap();
        assert!(raw.contains("    \"Algebra\""));
        assert!(raw.contains("        \"start\": 1"));
        assert!(raw.contains("        \"end\": 3"));

        let restored = store.load(&dest).unwrap().unwrap();
        assert_eq!(restored, marks);
    }

    #[test]
    fn file_mark_store_overwrites_existing_file() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("marks.json");
        std::fs::write(&dest, "stale").unwrap();

        let mut marks = Marks::new();
        marks.record("Algebra", RangeEndpoint::Start, 2).unwrap();

        let store = FileMarkStore::new();
        store.save(&dest, &marks).unwrap();

        let restored = store.load(&dest).unwrap().unwrap();
        assert_eq!(restored.range("Algebra").unwrap().start, Some(2));
    }

    #[test]
    fn absent_endpoint_is_omitted_from_json() {
        let mut marks = Marks::new();
        marks.record("Algebra", RangeEndpoint::Start, 4).unwrap();

        let raw = String::from_utf8(marks_to_pretty_json(&marks).unwrap()).unwrap();
        assert!(raw.contains("\"start\": 4"));
        assert!(!raw.contains("\"end\""));
    }

    #[test]
    fn listing_filters_pdf_suffix_case_insensitively() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.pdf"), b"x").unwrap();
        std::fs::write(dir.path().join("b.txt"), b"x").unwrap();
        std::fs::write(dir.path().join("C.PDF"), b"x").unwrap();

        let listing = FileListing::scan(dir.path(), true).unwrap();
        let names: Vec<_> = listing
            .entries()
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
            .collect();
        assert_eq!(names, vec!["C.PDF", "a.pdf"]);
    }

    #[test]
    fn listing_skips_subdirectories() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested.pdf")).unwrap();
        std::fs::write(dir.path().join("real.pdf"), b"x").unwrap();

        let listing = FileListing::scan(dir.path(), true).unwrap();
        assert_eq!(listing.len(), 1);
        assert!(listing.get(0).unwrap().ends_with("real.pdf"));
    }

    #[tokio::test]
    async fn scan_directory_replaces_listing_wholesale() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        std::fs::write(first.path().join("a.pdf"), b"x").unwrap();
        std::fs::write(second.path().join("b.pdf"), b"x").unwrap();
        std::fs::write(second.path().join("c.pdf"), b"x").unwrap();

        let mut session = session();
        session.scan_directory(first.path()).unwrap();
        assert_eq!(session.listing().len(), 1);
        session.scan_directory(second.path()).unwrap();
        assert_eq!(session.listing().len(), 2);
        assert_eq!(session.listing().dir(), Some(second.path()));
    }

    #[test]
    fn config_defaults_when_file_is_missing() {
        let dir = tempdir().unwrap();
        let config = Config::load(&dir.path().join("config.toml")).unwrap();
        assert!((config.scale - 1.0).abs() < f32::EPSILON);
        assert!(!config.dark_mode);
        assert!(config.sort_listing);
    }

    #[test]
    fn config_reads_partial_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "dark_mode = true\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert!(config.dark_mode);
        assert!(config.sort_listing);
    }
}
