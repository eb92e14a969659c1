use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use crossterm::cursor;
use crossterm::event;
use crossterm::style::{Attribute, Print, SetAttribute};
use crossterm::terminal::{self, Clear, ClearType};
use directories::ProjectDirs;
use pagemark_core::{
    Command, Config, FileListing, FileMarkStore, MarkStore, OpenDocument, RenderImage, Session,
    SessionEvent,
};
use pagemark_render::PdfRenderFactory;
use pagemark_tty::{write_status_line, DrawParams, EventMapper, InputMode, KittyRenderer, UiEvent};
use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(
    name = "pagemark",
    version,
    about = "terminal PDF viewer with per-class page-range marking"
)]
struct Args {
    /// PDF file to open at startup
    file: Option<PathBuf>,

    /// Directory whose PDF files populate the listing
    #[arg(short = 'D', long = "directory")]
    directory: Option<PathBuf>,

    /// Page to open the document on (0-based)
    #[arg(short = 'p', long = "page")]
    page: Option<usize>,

    /// Default destination for saved marks
    #[arg(short = 'm', long = "marks")]
    marks: Option<PathBuf>,
}

struct RawModeGuard;

impl RawModeGuard {
    fn new() -> anyhow::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
        let mut stdout = io::stdout();
        let _ = crossterm::execute!(stdout, cursor::Show);
    }
}

struct App {
    session: Session,
    provider: PdfRenderFactory,
    default_marks_path: Option<PathBuf>,
    status_message: Option<String>,
}

impl App {
    fn drain_events(&mut self) -> Vec<SessionEvent> {
        let events = self.session.events();
        let mut guard = events.lock();
        std::mem::take(&mut *guard)
    }

    /// The path the save prompt is pre-filled with: the explicit default if
    /// one was given, otherwise the open document's path with a json
    /// extension.
    fn suggested_marks_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.default_marks_path {
            return Some(path.clone());
        }
        self.session
            .open_document()
            .map(|doc| doc.info.path.with_extension("json"))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let project_dirs = ProjectDirs::from("net", "pagemark", "pagemark")
        .ok_or_else(|| anyhow!("unable to resolve platform data directories"))?;
    let _log_guard = init_logging(&project_dirs)?;
    let config = Config::load(&project_dirs.config_dir().join("config.toml"))?;

    let store: Arc<dyn MarkStore> = Arc::new(FileMarkStore::new());
    let mut app = App {
        session: Session::new(store, config),
        provider: PdfRenderFactory::new()?,
        default_marks_path: args.marks.clone(),
        status_message: None,
    };

    if let Some(dir) = &args.directory {
        app.session
            .scan_directory(dir)
            .with_context(|| format!("failed to list directory {:?}", dir))?;
    }

    if let Some(path) = &args.file {
        match app.session.open_with(&app.provider, path.clone()).await {
            Ok(()) => {
                if let Some(page) = args.page {
                    app.session.apply(Command::GotoPage { page })?;
                }
            }
            Err(err) => {
                warn!(?err, path = %path.display(), "failed to open document");
                app.status_message = Some(format!("could not open {}: {err:#}", path.display()));
            }
        }
    }
    app.drain_events();

    let _raw = RawModeGuard::new()?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, cursor::Hide)?;
    let mut renderer = KittyRenderer::new(stdout);
    let mut event_mapper = EventMapper::new();
    let mut overlay = OverlayState::None;
    let mut dirty = true;
    let mut needs_initial_clear = true;

    loop {
        if overlay.is_active() {
            if event_mapper.mode() != InputMode::Listing {
                event_mapper.set_mode(InputMode::Listing);
            }
        } else if matches!(event_mapper.mode(), InputMode::Listing) {
            event_mapper.set_mode(InputMode::Normal);
        }

        if dirty {
            let pending = event_mapper.pending_input();
            if needs_initial_clear {
                renderer.clear_all()?;
                needs_initial_clear = false;
            }
            renderer.begin_sync_update()?;
            let drawn = redraw(&mut renderer, &app, pending.as_deref(), &mut overlay);
            renderer.end_sync_update()?;
            drawn?;
            dirty = false;
        }

        if event::poll(Duration::from_millis(100))? {
            let ev = event::read()?;
            let ui_event = event_mapper.map_event(ev);
            let pending = event_mapper.pending_input();
            if !overlay.is_active() {
                if let Some(status) = combine_status(Some(session_status(&app)), pending.as_deref())
                {
                    draw_status_line(&mut renderer, &status)?;
                }
            }
            let overlay_was_active = overlay.is_active();
            match handle_event(ui_event, &mut app, &mut overlay, &mut event_mapper).await? {
                LoopAction::ContinueRedraw => dirty = true,
                LoopAction::Continue => {}
                LoopAction::Quit => break,
            }
            if overlay.is_active() != overlay_was_active {
                needs_initial_clear = true;
                dirty = true;
            }
        }
    }

    renderer.clear_all()?;
    Ok(())
}

enum LoopAction {
    Continue,
    ContinueRedraw,
    Quit,
}

enum OverlayState {
    None,
    Listing(ListingWindow),
}

impl OverlayState {
    fn deactivate(&mut self) {
        *self = OverlayState::None;
    }

    fn is_active(&self) -> bool {
        !matches!(self, OverlayState::None)
    }
}

/// The directory listing overlay: the terminal's stand-in for the original
/// side file list.
struct ListingWindow {
    names: Vec<String>,
    selected: usize,
    scroll_offset: usize,
}

impl ListingWindow {
    fn from_listing(listing: &FileListing) -> Self {
        let names = listing
            .entries()
            .iter()
            .map(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .unwrap_or("<invalid name>")
                    .to_string()
            })
            .collect();
        Self {
            names,
            selected: 0,
            scroll_offset: 0,
        }
    }

    fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn selected_index(&self) -> Option<usize> {
        if self.names.is_empty() {
            None
        } else {
            Some(self.selected)
        }
    }

    fn move_selection(&mut self, delta: isize) -> bool {
        if self.names.is_empty() {
            return false;
        }
        let len = self.names.len() as isize;
        let next = (self.selected as isize + delta).clamp(0, len - 1) as usize;
        if next != self.selected {
            self.selected = next;
            true
        } else {
            false
        }
    }

    fn ensure_visible(&mut self, viewport_height: usize) {
        if viewport_height == 0 || self.names.is_empty() {
            self.scroll_offset = 0;
            return;
        }
        let max_offset = self.names.len().saturating_sub(viewport_height.max(1));
        if self.scroll_offset > max_offset {
            self.scroll_offset = max_offset;
        }
        if self.selected < self.scroll_offset {
            self.scroll_offset = self.selected;
            return;
        }
        let bottom = self.scroll_offset + viewport_height;
        if self.selected >= bottom {
            self.scroll_offset = self
                .selected
                .saturating_sub(viewport_height.saturating_sub(1));
        }
    }
}

async fn handle_event(
    event: UiEvent,
    app: &mut App,
    overlay: &mut OverlayState,
    mapper: &mut EventMapper,
) -> Result<LoopAction> {
    match event {
        UiEvent::Command(cmd) => Ok(apply_command(app, cmd)),
        UiEvent::BeginClassEntry => Ok(LoopAction::ContinueRedraw),
        UiEvent::ClassEntryChanged { .. } => Ok(LoopAction::Continue),
        UiEvent::ClassEntrySubmit { text } => {
            let action = apply_command(app, Command::SetClassName { name: text });
            Ok(match action {
                LoopAction::Continue => LoopAction::ContinueRedraw,
                other => other,
            })
        }
        UiEvent::ClassEntryCancel => Ok(LoopAction::ContinueRedraw),
        UiEvent::BeginSavePath => {
            if let Some(path) = app.suggested_marks_path() {
                mapper.seed_entry(&path.to_string_lossy());
            }
            Ok(LoopAction::ContinueRedraw)
        }
        UiEvent::SavePathChanged { .. } => Ok(LoopAction::Continue),
        UiEvent::SavePathSubmit { text } => {
            if text.is_empty() {
                app.status_message = Some("save cancelled".to_string());
                return Ok(LoopAction::ContinueRedraw);
            }
            let path = PathBuf::from(text);
            if let Err(err) = app.session.save_marks(&path) {
                warn!(?err, path = %path.display(), "failed to save marks");
                app.status_message = Some(format!("could not save marks: {err:#}"));
                return Ok(LoopAction::ContinueRedraw);
            }
            app.default_marks_path = Some(path);
            process_session_events(app);
            Ok(LoopAction::ContinueRedraw)
        }
        UiEvent::SavePathCancel => {
            app.status_message = Some("save cancelled".to_string());
            Ok(LoopAction::ContinueRedraw)
        }
        UiEvent::OpenListing => {
            *overlay = OverlayState::Listing(ListingWindow::from_listing(app.session.listing()));
            mapper.set_mode(InputMode::Listing);
            Ok(LoopAction::ContinueRedraw)
        }
        UiEvent::CloseOverlay => {
            if overlay.is_active() {
                overlay.deactivate();
                mapper.set_mode(InputMode::Normal);
                Ok(LoopAction::ContinueRedraw)
            } else {
                Ok(LoopAction::Continue)
            }
        }
        UiEvent::ListingMoveSelection { delta } => {
            if let OverlayState::Listing(listing) = overlay {
                if listing.move_selection(delta) {
                    return Ok(LoopAction::ContinueRedraw);
                }
            }
            Ok(LoopAction::Continue)
        }
        UiEvent::ListingActivateSelection => {
            let index = match overlay {
                OverlayState::Listing(listing) => listing.selected_index(),
                OverlayState::None => None,
            };
            let Some(index) = index else {
                return Ok(LoopAction::Continue);
            };
            let Some(path) = app.session.listing_entry(index) else {
                return Ok(LoopAction::Continue);
            };

            if let Err(err) = app.session.open_with(&app.provider, path.clone()).await {
                warn!(?err, path = %path.display(), "failed to open document from listing");
                app.status_message = Some(format!("could not open {}: {err:#}", path.display()));
            }
            app.drain_events();
            overlay.deactivate();
            mapper.set_mode(InputMode::Normal);
            Ok(LoopAction::ContinueRedraw)
        }
        UiEvent::Quit => Ok(LoopAction::Quit),
        UiEvent::None => Ok(LoopAction::Continue),
    }
}

fn apply_command(app: &mut App, command: Command) -> LoopAction {
    if let Err(err) = app.session.apply(command) {
        warn!(?err, "command failed");
        app.status_message = Some(format!("{err:#}"));
        return LoopAction::ContinueRedraw;
    }
    process_session_events(app)
}

fn process_session_events(app: &mut App) -> LoopAction {
    let mut action = LoopAction::Continue;
    for event in app.drain_events() {
        match event {
            SessionEvent::RedrawNeeded | SessionEvent::ListingChanged => {
                action = LoopAction::ContinueRedraw;
            }
            SessionEvent::DocumentOpened(path) => {
                app.status_message = Some(format!("opened {}", display_name(&path)));
                action = LoopAction::ContinueRedraw;
            }
            SessionEvent::MarkRecorded {
                class_name,
                endpoint,
                page,
            } => {
                app.status_message = Some(format!(
                    "{} page for {} marked as {}",
                    endpoint.label(),
                    class_name,
                    page
                ));
                action = LoopAction::ContinueRedraw;
            }
            SessionEvent::MarkRejected(err) => {
                app.status_message = Some(err.to_string());
                action = LoopAction::ContinueRedraw;
            }
            SessionEvent::MarksSaved(path) => {
                app.status_message = Some(format!("marks saved to {}", path.display()));
                action = LoopAction::ContinueRedraw;
            }
        }
    }
    action
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_owned)
        .unwrap_or_else(|| path.display().to_string())
}

fn redraw(
    renderer: &mut KittyRenderer<io::Stdout>,
    app: &App,
    pending_input: Option<&str>,
    overlay: &mut OverlayState,
) -> Result<()> {
    let window = terminal::window_size()?;
    let total_cols = u32::from(window.columns).max(1);
    let total_rows = u32::from(window.rows).max(1);
    let pixel_width = u32::from(window.width);
    let pixel_height = u32::from(window.height);
    let image_rows_available = total_rows.saturating_sub(1).max(1);

    if let OverlayState::Listing(listing) = overlay {
        renderer.clear_all()?;
        draw_listing_overlay(renderer, listing, total_cols, image_rows_available)?;
        return Ok(());
    }

    if let Some(doc) = app.session.open_document() {
        let margin_cols = total_cols.min(2);
        let margin_rows = image_rows_available.min(2);
        let available_cols = total_cols.saturating_sub(margin_cols).max(1);
        let available_rows = image_rows_available.saturating_sub(margin_rows).max(1);

        let base_scale = doc.scale;
        let mut render_scale = base_scale;
        let mut image = match doc.render() {
            Ok(image) => image,
            Err(err) => {
                warn!(?err, page = doc.current_page, "failed to render page");
                let status = format!("failed to render page {}: {err:#}", doc.current_page + 1);
                draw_status_line(renderer, &status)?;
                return Ok(());
            }
        };

        // Upscale small bitmaps so the page fills the available cell grid.
        if pixel_width > 0 && pixel_height > 0 && image.width > 0 && image.height > 0 {
            let cell_width = pixel_width as f32 / total_cols as f32;
            let cell_height = pixel_height as f32 / total_rows as f32;
            let desired_width = cell_width * available_cols as f32;
            let desired_height = cell_height * available_rows as f32;
            if desired_width > 0.0 && desired_height > 0.0 {
                let width_ratio = desired_width / image.width as f32;
                let height_ratio = desired_height / image.height as f32;
                let scale_ratio = width_ratio.min(height_ratio);
                if scale_ratio > 1.05 {
                    render_scale = (base_scale * scale_ratio).min(8.0);
                    match doc.render_with_scale(render_scale) {
                        Ok(upscaled) => image = upscaled,
                        Err(err) => {
                            warn!(?err, page = doc.current_page, "failed to render page");
                            render_scale = base_scale;
                        }
                    }
                }
            }
        }

        let (draw_cols, draw_rows) = compute_scaled_dimensions(
            &image,
            available_cols,
            available_rows,
            total_cols,
            total_rows,
            pixel_width,
            pixel_height,
        );
        let start_col = (total_cols.saturating_sub(draw_cols)) / 2;
        let start_row = (image_rows_available.saturating_sub(draw_rows)) / 2;

        {
            let mut writer = renderer.writer();
            crossterm::execute!(
                &mut writer,
                cursor::MoveTo(start_col as u16, start_row as u16)
            )?;
        }

        renderer.draw(&image, DrawParams::clamped(draw_cols, draw_rows))?;

        if let Some(status) = combine_status(Some(session_status(app)), pending_input) {
            draw_status_line(renderer, &status)?;
        }

        if let Err(err) = doc.prefetch_neighbors(2, render_scale) {
            warn!(
                ?err,
                page = doc.current_page,
                "failed to prefetch neighboring pages"
            );
        }
    } else {
        renderer.clear_all()?;
        if let Some(status) = combine_status(Some(session_status(app)), pending_input) {
            draw_status_line(renderer, &status)?;
        }
    }

    Ok(())
}

fn session_status(app: &App) -> String {
    let mut status = match app.session.open_document() {
        Some(doc) => format_document_status(doc),
        None => "no document open".to_string(),
    };

    status.push_str(" | mark ");
    status.push_str(app.session.endpoint().label());
    status.push(' ');
    if app.session.class_name().is_empty() {
        status.push_str("<no class>");
    } else {
        status.push_str(app.session.class_name());
    }

    if !app.session.marks().is_empty() {
        status.push_str(&format!(" | {} class(es)", app.session.marks().len()));
    }

    if let Some(message) = &app.status_message {
        status.push_str(" | ");
        status.push_str(message);
    }

    status
}

fn format_document_status(doc: &OpenDocument) -> String {
    let zoom_percent = doc.scale * 100.0;
    let zoom_display = if zoom_percent.is_finite() {
        format!("{:.0}%", zoom_percent)
    } else {
        "?".to_string()
    };

    let title = doc
        .info
        .metadata
        .title
        .as_deref()
        .filter(|title| !title.is_empty());
    let name = match title {
        Some(title) => title.to_string(),
        None => display_name(&doc.info.path),
    };

    format!(
        "{} | page {}/{} | {}",
        name,
        doc.current_page + 1,
        doc.info.page_count,
        zoom_display
    )
}

fn combine_status(base: Option<String>, pending_input: Option<&str>) -> Option<String> {
    match (base, pending_input.filter(|s| !s.is_empty())) {
        (Some(mut base), Some(pending)) => {
            base.push_str(" | ");
            base.push_str(pending);
            Some(base)
        }
        (Some(base), None) => Some(base),
        (None, Some(pending)) => Some(pending.to_string()),
        (None, None) => None,
    }
}

fn draw_status_line(renderer: &mut KittyRenderer<io::Stdout>, status: &str) -> Result<()> {
    let window = terminal::window_size()?;
    let total_rows = u32::from(window.rows).max(1);
    let status_row = total_rows.saturating_sub(1);
    let mut writer = renderer.writer();
    crossterm::execute!(
        &mut writer,
        cursor::MoveTo(0, status_row as u16),
        Clear(ClearType::CurrentLine)
    )?;
    write_status_line(&mut writer, status)?;
    Ok(())
}

fn draw_listing_overlay(
    renderer: &mut KittyRenderer<io::Stdout>,
    listing: &mut ListingWindow,
    total_cols: u32,
    image_rows_available: u32,
) -> Result<()> {
    const TITLE: &str = "Open PDF";
    const EMPTY_MESSAGE: &str = "No PDF files in listing";

    if total_cols < 20 || image_rows_available < 6 {
        return Ok(());
    }

    let max_inner_width = total_cols.saturating_sub(6) as usize;
    if max_inner_width < 10 {
        return Ok(());
    }

    let base_width = if listing.is_empty() {
        EMPTY_MESSAGE.len() + 2
    } else {
        listing
            .names
            .iter()
            .map(|name| name.len() + 2)
            .max()
            .unwrap_or(0)
            .max(TITLE.len())
    };

    let mut inner_width = base_width.min(max_inner_width);
    let min_inner_width = 20.min(max_inner_width);
    if inner_width < min_inner_width {
        inner_width = min_inner_width;
    }

    let max_window_height = image_rows_available.saturating_sub(2);
    if max_window_height < 6 {
        return Ok(());
    }
    let max_content_height = max_window_height.saturating_sub(4) as usize;
    if max_content_height == 0 {
        return Ok(());
    }

    let total_entries = if listing.is_empty() {
        1
    } else {
        listing.names.len()
    };
    let content_height = total_entries.min(max_content_height).max(1);
    listing.ensure_visible(content_height);
    let max_scroll = total_entries.saturating_sub(content_height);
    if listing.scroll_offset > max_scroll {
        listing.scroll_offset = max_scroll;
    }

    let window_height = (content_height + 4) as u32;
    if window_height > max_window_height {
        return Ok(());
    }
    let window_width = (inner_width + 2) as u32;
    if window_width > total_cols {
        return Ok(());
    }

    let start_col = (total_cols.saturating_sub(window_width)) / 2;
    let start_row = (image_rows_available.saturating_sub(window_height)) / 2;

    let mut writer = renderer.writer();
    let mut current_row = start_row as u16;
    let start_col_u16 = start_col as u16;
    let horizontal_border = "-".repeat(inner_width);

    print_inverted(
        &mut writer,
        start_col_u16,
        current_row,
        &format!("+{}+", horizontal_border),
    )?;
    current_row = current_row.saturating_add(1);

    let title_line = format!("|{: ^inner_width$}|", TITLE, inner_width = inner_width);
    print_inverted(&mut writer, start_col_u16, current_row, &title_line)?;
    current_row = current_row.saturating_add(1);

    let divider = format!("|{}|", "-".repeat(inner_width));
    print_inverted(&mut writer, start_col_u16, current_row, &divider)?;
    current_row = current_row.saturating_add(1);

    if listing.is_empty() {
        let content = truncate_with_ellipsis(format!("  {}", EMPTY_MESSAGE), inner_width);
        let line = format!("|{}|", content);
        print_inverted(&mut writer, start_col_u16, current_row, &line)?;
        current_row = current_row.saturating_add(1);
    } else {
        let start_index = listing.scroll_offset;
        let end_index = (start_index + content_height).min(listing.names.len());
        for idx in start_index..end_index {
            let marker = if idx == listing.selected { '>' } else { ' ' };
            let content = truncate_with_ellipsis(
                format!("{} {}", marker, listing.names[idx]),
                inner_width,
            );
            let line = format!("|{}|", content);
            print_inverted(&mut writer, start_col_u16, current_row, &line)?;
            current_row = current_row.saturating_add(1);
        }

        let rendered = end_index - start_index;
        for _ in rendered..content_height {
            let line = format!("|{}|", " ".repeat(inner_width));
            print_inverted(&mut writer, start_col_u16, current_row, &line)?;
            current_row = current_row.saturating_add(1);
        }
    }

    print_inverted(
        &mut writer,
        start_col_u16,
        current_row,
        &format!("+{}+", horizontal_border),
    )?;

    Ok(())
}

fn print_inverted(writer: &mut impl Write, col: u16, row: u16, content: &str) -> Result<()> {
    crossterm::execute!(
        writer,
        cursor::MoveTo(col, row),
        SetAttribute(Attribute::Reverse),
        Print(content),
        SetAttribute(Attribute::Reset)
    )?;
    Ok(())
}

fn truncate_with_ellipsis(mut text: String, width: usize) -> String {
    if text.len() > width {
        if width <= 3 {
            text.truncate(width);
        } else {
            let mut truncated = text.chars().take(width - 3).collect::<String>();
            truncated.push_str("...");
            text = truncated;
        }
    }
    if text.len() < width {
        text.push_str(&" ".repeat(width - text.len()));
    }
    text
}

fn init_logging(project_dirs: &ProjectDirs) -> Result<WorkerGuard> {
    let log_dir = project_dirs.data_local_dir().join("logs");
    fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::never(log_dir, "pagemark.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .try_init()
        .map_err(|err| anyhow!(err))?;

    Ok(guard)
}

fn compute_scaled_dimensions(
    image: &RenderImage,
    available_cols: u32,
    available_rows: u32,
    total_cols: u32,
    total_rows: u32,
    pixel_width: u32,
    pixel_height: u32,
) -> (u32, u32) {
    let mut draw_cols = available_cols.max(1);
    let mut draw_rows = available_rows.max(1);

    if image.width == 0 || image.height == 0 {
        return (draw_cols, draw_rows);
    }

    if pixel_width > 0 && pixel_height > 0 && total_cols > 0 && total_rows > 0 {
        let cell_width = pixel_width as f32 / total_cols as f32;
        let cell_height = pixel_height as f32 / total_rows as f32;

        if cell_width > 0.0 && cell_height > 0.0 {
            let mut cols = (image.width as f32 / cell_width).round().max(1.0);
            let mut rows = (image.height as f32 / cell_height).round().max(1.0);

            if cols > available_cols as f32 {
                cols = available_cols as f32;
            }
            if rows > available_rows as f32 {
                rows = available_rows as f32;
            }

            draw_cols = cols as u32;
            draw_rows = rows as u32;
        }
    } else {
        let ratio = image.width as f32 / image.height as f32;
        if ratio.is_finite() && ratio > 0.0 {
            let mut cols = available_cols as f32;
            let mut rows = (cols / ratio).round().max(1.0);

            if rows > available_rows as f32 {
                rows = available_rows as f32;
                cols = (rows * ratio).round().max(1.0);
            }

            draw_cols = cols.min(available_cols as f32) as u32;
            draw_rows = rows.min(available_rows as f32) as u32;
        }
    }

    draw_cols = draw_cols.max(1).min(available_cols);
    draw_rows = draw_rows.max(1).min(available_rows);

    (draw_cols, draw_rows)
}
