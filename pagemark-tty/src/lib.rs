use std::io::{self, Write};

use anyhow::Result;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use crossterm::{
    cursor,
    event::{Event, KeyCode, KeyEvent, KeyModifiers},
    terminal::{Clear, ClearType},
};
use pagemark_core::{Command, RangeEndpoint, RenderImage};
use png::{BitDepth, ColorType, Encoder};

pub struct KittyRenderer<W: Write> {
    writer: W,
    image_id: u32,
    placement_id: u32,
}

pub struct DrawParams {
    pub columns: u32,
    pub rows: u32,
}

impl DrawParams {
    pub fn clamped(columns: u32, rows: u32) -> Self {
        Self {
            columns: columns.max(1),
            rows: rows.max(1),
        }
    }
}

impl<W: Write> KittyRenderer<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            image_id: 1,
            placement_id: 1,
        }
    }

    pub fn writer(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Encodes the bitmap as PNG and transmits it with the kitty graphics
    /// protocol, chunked at the 4096-byte payload limit.
    pub fn draw(&mut self, image: &RenderImage, params: DrawParams) -> Result<()> {
        let mut buffer = Vec::new();
        let mut encoder = Encoder::new(&mut buffer, image.width, image.height);
        encoder.set_color(ColorType::Rgba);
        encoder.set_depth(BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&image.pixels)?;
        writer.finish()?;

        let encoded = BASE64.encode(&buffer);
        let mut chunks = encoded.as_bytes().chunks(4096).peekable();
        let mut first = true;

        while let Some(chunk) = chunks.next() {
            let more = chunks.peek().is_some();
            if first {
                write!(
                    self.writer,
                    "\u{1b}_Ga=T,f=100,C=1,q=2,i={},p={},c={},r={},s={},v={},z=-1,m={}",
                    self.image_id,
                    self.placement_id,
                    params.columns,
                    params.rows,
                    image.width,
                    image.height,
                    if more { 1 } else { 0 }
                )?;
                first = false;
            } else {
                write!(self.writer, "\u{1b}_Gm={},q=2", if more { 1 } else { 0 })?;
            }
            if !chunk.is_empty() {
                self.writer.write_all(b";")?;
                self.writer.write_all(chunk)?;
            }
            write!(self.writer, "\u{1b}\\")?;
        }

        self.writer.flush()?;
        Ok(())
    }

    pub fn begin_sync_update(&mut self) -> Result<()> {
        write!(self.writer, "\u{1b}[?2026h")?;
        Ok(())
    }

    /// Disables synchronized updates so the terminal renders all buffered
    /// changes at once.
    pub fn end_sync_update(&mut self) -> Result<()> {
        write!(self.writer, "\u{1b}[?2026l")?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn clear_all(&mut self) -> Result<()> {
        crossterm::execute!(
            &mut self.writer,
            Clear(ClearType::All),
            cursor::MoveTo(0, 0)
        )?;
        Ok(())
    }
}

pub fn write_status_line<W: Write>(writer: &mut W, label: &str) -> io::Result<()> {
    write!(writer, "{}", label)?;
    writer.flush()
}

#[derive(Debug, Clone)]
pub enum UiEvent {
    Command(Command),
    OpenListing,
    CloseOverlay,
    ListingMoveSelection { delta: isize },
    ListingActivateSelection,
    BeginClassEntry,
    ClassEntryChanged { text: String },
    ClassEntrySubmit { text: String },
    ClassEntryCancel,
    BeginSavePath,
    SavePathChanged { text: String },
    SavePathSubmit { text: String },
    SavePathCancel,
    Quit,
    None,
}

/// The keyboard stands in for the original buttons and dialogs: `Listing` is
/// the side file list, the two entry modes are the class-name field and the
/// save dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Normal,
    Listing,
    ClassEntry,
    SavePath,
}

#[derive(Debug, Default)]
pub struct EventMapper {
    pending_count: Option<usize>,
    pending_digits: String,
    mode: InputMode,
    entry_buffer: String,
}

impl EventMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_mode(&mut self, mode: InputMode) {
        if self.mode != mode {
            self.reset_count();
            self.entry_buffer.clear();
            self.mode = mode;
        }
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    /// Pre-fills the text buffer of an entry mode, e.g. the default save
    /// destination or the previously used class name.
    pub fn seed_entry(&mut self, text: &str) {
        if matches!(self.mode, InputMode::ClassEntry | InputMode::SavePath) {
            self.entry_buffer.clear();
            self.entry_buffer.push_str(text);
        }
    }

    pub fn map_event(&mut self, event: Event) -> UiEvent {
        match self.mode {
            InputMode::Normal => self.map_event_normal(event),
            InputMode::Listing => self.map_event_listing(event),
            InputMode::ClassEntry | InputMode::SavePath => self.map_event_entry(event),
        }
    }

    fn map_event_normal(&mut self, event: Event) -> UiEvent {
        match event {
            Event::Key(KeyEvent {
                code, modifiers, ..
            }) => match (code, modifiers) {
                (KeyCode::Char(c), KeyModifiers::NONE) if c.is_ascii_digit() => {
                    if let Some(digit) = c.to_digit(10) {
                        self.push_digit(digit as usize);
                    }
                    UiEvent::None
                }
                (KeyCode::Char('j'), KeyModifiers::NONE) | (KeyCode::Down, KeyModifiers::NONE) => {
                    let count = self.take_count();
                    UiEvent::Command(Command::NextPage { count })
                }
                (KeyCode::Char('k'), KeyModifiers::NONE) | (KeyCode::Up, KeyModifiers::NONE) => {
                    let count = self.take_count();
                    UiEvent::Command(Command::PrevPage { count })
                }
                (KeyCode::Char('g'), KeyModifiers::NONE) | (KeyCode::Home, _) => {
                    self.reset_count();
                    UiEvent::Command(Command::GotoPage { page: 0 })
                }
                (KeyCode::Char('G'), KeyModifiers::SHIFT) | (KeyCode::End, _) => {
                    self.reset_count();
                    UiEvent::Command(Command::GotoPage { page: usize::MAX })
                }
                (KeyCode::Char('s'), KeyModifiers::NONE) => {
                    self.reset_count();
                    UiEvent::Command(Command::SelectEndpoint {
                        endpoint: RangeEndpoint::Start,
                    })
                }
                (KeyCode::Char('e'), KeyModifiers::NONE) => {
                    self.reset_count();
                    UiEvent::Command(Command::SelectEndpoint {
                        endpoint: RangeEndpoint::End,
                    })
                }
                (KeyCode::Char('c'), KeyModifiers::NONE) => {
                    self.reset_count();
                    self.set_mode(InputMode::ClassEntry);
                    UiEvent::BeginClassEntry
                }
                (KeyCode::Char('m'), KeyModifiers::NONE) => {
                    self.reset_count();
                    UiEvent::Command(Command::MarkPage)
                }
                (KeyCode::Char('w'), KeyModifiers::NONE) => {
                    self.reset_count();
                    self.set_mode(InputMode::SavePath);
                    UiEvent::BeginSavePath
                }
                (KeyCode::Char('o'), KeyModifiers::NONE) => {
                    self.reset_count();
                    UiEvent::OpenListing
                }
                (KeyCode::Char('d'), _) => {
                    self.reset_count();
                    UiEvent::Command(Command::ToggleDarkMode)
                }
                (KeyCode::Char('+'), _) => {
                    self.reset_count();
                    UiEvent::Command(Command::ScaleBy { factor: 1.1 })
                }
                (KeyCode::Char('-'), _) => {
                    self.reset_count();
                    UiEvent::Command(Command::ScaleBy { factor: 0.9 })
                }
                (KeyCode::Char('='), _) => {
                    self.reset_count();
                    UiEvent::Command(Command::ResetScale)
                }
                (KeyCode::Char('q'), _) => {
                    self.reset_count();
                    UiEvent::Quit
                }
                _ => {
                    self.reset_count();
                    UiEvent::None
                }
            },
            _ => UiEvent::None,
        }
    }

    fn map_event_listing(&mut self, event: Event) -> UiEvent {
        match event {
            Event::Key(KeyEvent {
                code, modifiers, ..
            }) => match (code, modifiers) {
                (KeyCode::Esc, _) | (KeyCode::Char('o'), KeyModifiers::NONE) => {
                    UiEvent::CloseOverlay
                }
                (KeyCode::Enter, _) => UiEvent::ListingActivateSelection,
                (KeyCode::Char('j'), KeyModifiers::NONE) | (KeyCode::Down, KeyModifiers::NONE) => {
                    UiEvent::ListingMoveSelection { delta: 1 }
                }
                (KeyCode::Char('k'), KeyModifiers::NONE) | (KeyCode::Up, KeyModifiers::NONE) => {
                    UiEvent::ListingMoveSelection { delta: -1 }
                }
                (KeyCode::Char('q'), _) => UiEvent::Quit,
                _ => UiEvent::None,
            },
            _ => UiEvent::None,
        }
    }

    fn map_event_entry(&mut self, event: Event) -> UiEvent {
        let save_path = matches!(self.mode, InputMode::SavePath);
        match event {
            Event::Key(KeyEvent {
                code, modifiers, ..
            }) => match (code, modifiers) {
                (KeyCode::Esc, _) => {
                    self.set_mode(InputMode::Normal);
                    if save_path {
                        UiEvent::SavePathCancel
                    } else {
                        UiEvent::ClassEntryCancel
                    }
                }
                (KeyCode::Enter, _) => {
                    let text = self.entry_buffer.clone();
                    self.set_mode(InputMode::Normal);
                    if save_path {
                        UiEvent::SavePathSubmit { text }
                    } else {
                        UiEvent::ClassEntrySubmit { text }
                    }
                }
                (KeyCode::Backspace, _) => {
                    self.entry_buffer.pop();
                    let text = self.entry_buffer.clone();
                    if save_path {
                        UiEvent::SavePathChanged { text }
                    } else {
                        UiEvent::ClassEntryChanged { text }
                    }
                }
                (KeyCode::Char(c), mods) if mods.is_empty() || mods == KeyModifiers::SHIFT => {
                    self.entry_buffer.push(c);
                    let text = self.entry_buffer.clone();
                    if save_path {
                        UiEvent::SavePathChanged { text }
                    } else {
                        UiEvent::ClassEntryChanged { text }
                    }
                }
                _ => UiEvent::None,
            },
            _ => UiEvent::None,
        }
    }

    fn push_digit(&mut self, digit: usize) {
        let current = self.pending_count.unwrap_or(0);
        let next = current.saturating_mul(10).saturating_add(digit);
        self.pending_count = Some(next);
        if let Some(c) = char::from_digit(digit as u32, 10) {
            self.pending_digits.push(c);
        }
    }

    fn take_count(&mut self) -> usize {
        let count = self
            .pending_count
            .take()
            .filter(|&count| count > 0)
            .unwrap_or(1);
        self.pending_digits.clear();
        count
    }

    fn reset_count(&mut self) {
        self.pending_count = None;
        self.pending_digits.clear();
    }

    pub fn pending_input(&self) -> Option<String> {
        match self.mode {
            InputMode::ClassEntry => Some(format!("class: {}", self.entry_buffer)),
            InputMode::SavePath => Some(format!("save: {}", self.entry_buffer)),
            InputMode::Listing => None,
            InputMode::Normal => {
                if self.pending_digits.is_empty() {
                    None
                } else {
                    Some(self.pending_digits.clone())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEventKind, KeyEventState};

    #[test]
    fn kitty_draw_emits_protocol() {
        let mut renderer = KittyRenderer::new(Vec::new());
        let image = RenderImage {
            width: 1,
            height: 1,
            pixels: vec![255, 0, 0, 255],
        };

        renderer.draw(&image, DrawParams::clamped(10, 5)).unwrap();
        let output = renderer.writer;
        assert_eq!(output[0], 0x1b);
        assert_eq!(output[1], b'_');
        assert_eq!(output[2], b'G');
    }

    fn key_event(code: KeyCode) -> Event {
        key_event_with_modifiers(code, KeyModifiers::NONE)
    }

    fn key_event_with_modifiers(code: KeyCode, modifiers: KeyModifiers) -> Event {
        Event::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    fn type_text(mapper: &mut EventMapper, text: &str) {
        for c in text.chars() {
            mapper.map_event(key_event(KeyCode::Char(c)));
        }
    }

    #[test]
    fn numeric_prefix_scales_page_navigation() {
        let mut mapper = EventMapper::new();
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Char('1'))),
            UiEvent::None
        ));
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Char('2'))),
            UiEvent::None
        ));

        match mapper.map_event(key_event(KeyCode::Char('j'))) {
            UiEvent::Command(Command::NextPage { count }) => assert_eq!(count, 12),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn numeric_prefix_resets_after_use() {
        let mut mapper = EventMapper::new();
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Char('3'))),
            UiEvent::None
        ));

        match mapper.map_event(key_event(KeyCode::Char('k'))) {
            UiEvent::Command(Command::PrevPage { count }) => assert_eq!(count, 3),
            other => panic!("unexpected event: {:?}", other),
        }

        match mapper.map_event(key_event(KeyCode::Char('k'))) {
            UiEvent::Command(Command::PrevPage { count }) => assert_eq!(count, 1),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn numeric_prefix_drops_on_other_command() {
        let mut mapper = EventMapper::new();
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Char('4'))),
            UiEvent::None
        ));
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Char('m'))),
            UiEvent::Command(Command::MarkPage)
        ));

        match mapper.map_event(key_event(KeyCode::Char('j'))) {
            UiEvent::Command(Command::NextPage { count }) => assert_eq!(count, 1),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn endpoint_keys_map_to_selection_commands() {
        let mut mapper = EventMapper::new();

        match mapper.map_event(key_event(KeyCode::Char('s'))) {
            UiEvent::Command(Command::SelectEndpoint { endpoint }) => {
                assert_eq!(endpoint, RangeEndpoint::Start)
            }
            other => panic!("unexpected event: {:?}", other),
        }

        match mapper.map_event(key_event(KeyCode::Char('e'))) {
            UiEvent::Command(Command::SelectEndpoint { endpoint }) => {
                assert_eq!(endpoint, RangeEndpoint::End)
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn goto_keys_map_to_first_and_last_page() {
        let mut mapper = EventMapper::new();

        match mapper.map_event(key_event(KeyCode::Char('g'))) {
            UiEvent::Command(Command::GotoPage { page }) => assert_eq!(page, 0),
            other => panic!("unexpected event: {:?}", other),
        }

        match mapper.map_event(key_event_with_modifiers(
            KeyCode::Char('G'),
            KeyModifiers::SHIFT,
        )) {
            UiEvent::Command(Command::GotoPage { page }) => assert_eq!(page, usize::MAX),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn class_entry_collects_text_until_submitted() {
        let mut mapper = EventMapper::new();

        match mapper.map_event(key_event(KeyCode::Char('c'))) {
            UiEvent::BeginClassEntry => {}
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(mapper.mode(), InputMode::ClassEntry);
        assert_eq!(mapper.pending_input().as_deref(), Some("class: "));

        type_text(&mut mapper, "Algebra");
        assert_eq!(mapper.pending_input().as_deref(), Some("class: Algebra"));

        match mapper.map_event(key_event(KeyCode::Backspace)) {
            UiEvent::ClassEntryChanged { ref text } => assert_eq!(text, "Algebr"),
            other => panic!("unexpected event: {:?}", other),
        }

        match mapper.map_event(key_event(KeyCode::Enter)) {
            UiEvent::ClassEntrySubmit { ref text } => assert_eq!(text, "Algebr"),
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(mapper.mode(), InputMode::Normal);
        assert!(mapper.pending_input().is_none());
    }

    #[test]
    fn class_entry_escape_cancels_without_text() {
        let mut mapper = EventMapper::new();
        mapper.map_event(key_event(KeyCode::Char('c')));
        type_text(&mut mapper, "His");

        match mapper.map_event(key_event(KeyCode::Esc)) {
            UiEvent::ClassEntryCancel => {}
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(mapper.mode(), InputMode::Normal);
        assert!(mapper.pending_input().is_none());
    }

    #[test]
    fn save_path_entry_can_be_seeded_with_a_default() {
        let mut mapper = EventMapper::new();

        match mapper.map_event(key_event(KeyCode::Char('w'))) {
            UiEvent::BeginSavePath => {}
            other => panic!("unexpected event: {:?}", other),
        }
        mapper.seed_entry("/tmp/marks.json");
        assert_eq!(
            mapper.pending_input().as_deref(),
            Some("save: /tmp/marks.json")
        );

        match mapper.map_event(key_event(KeyCode::Enter)) {
            UiEvent::SavePathSubmit { ref text } => assert_eq!(text, "/tmp/marks.json"),
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(mapper.mode(), InputMode::Normal);
    }

    #[test]
    fn seed_entry_is_ignored_outside_entry_modes() {
        let mut mapper = EventMapper::new();
        mapper.seed_entry("/tmp/marks.json");
        assert!(mapper.pending_input().is_none());
    }

    #[test]
    fn listing_mode_maps_navigation_keys() {
        let mut mapper = EventMapper::new();
        mapper.set_mode(InputMode::Listing);

        match mapper.map_event(key_event(KeyCode::Char('j'))) {
            UiEvent::ListingMoveSelection { delta } => assert_eq!(delta, 1),
            other => panic!("unexpected event: {:?}", other),
        }

        match mapper.map_event(key_event(KeyCode::Char('k'))) {
            UiEvent::ListingMoveSelection { delta } => assert_eq!(delta, -1),
            other => panic!("unexpected event: {:?}", other),
        }

        match mapper.map_event(key_event(KeyCode::Enter)) {
            UiEvent::ListingActivateSelection => {}
            other => panic!("unexpected event: {:?}", other),
        }

        match mapper.map_event(key_event(KeyCode::Esc)) {
            UiEvent::CloseOverlay => {}
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn switching_modes_clears_pending_state() {
        let mut mapper = EventMapper::new();
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Char('7'))),
            UiEvent::None
        ));
        assert_eq!(mapper.pending_input().as_deref(), Some("7"));

        mapper.set_mode(InputMode::Listing);
        assert!(mapper.pending_input().is_none());
        mapper.set_mode(InputMode::Normal);

        match mapper.map_event(key_event(KeyCode::Char('j'))) {
            UiEvent::Command(Command::NextPage { count }) => assert_eq!(count, 1),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn view_keys_map_to_scale_and_dark_mode() {
        let mut mapper = EventMapper::new();

        match mapper.map_event(key_event(KeyCode::Char('d'))) {
            UiEvent::Command(Command::ToggleDarkMode) => {}
            other => panic!("unexpected event: {:?}", other),
        }

        match mapper.map_event(key_event(KeyCode::Char('+'))) {
            UiEvent::Command(Command::ScaleBy { factor }) => {
                assert!((factor - 1.1).abs() < f32::EPSILON)
            }
            other => panic!("unexpected event: {:?}", other),
        }

        match mapper.map_event(key_event(KeyCode::Char('='))) {
            UiEvent::Command(Command::ResetScale) => {}
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
