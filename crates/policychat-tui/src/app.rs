use policychat_core::{ConversationController, Message};

use crate::ui;

pub struct App {
    pub should_quit: bool,
    pub controller: ConversationController,
    pub backend_url: String,

    // Draft editing
    pub cursor: usize, // char index into the draft

    // Transcript view
    pub chat_scroll: u16,
    pub follow_tail: bool,
    pub chat_height: u16, // inner height of the chat area, set during render
    pub chat_width: u16,  // inner width of the chat area, set during render

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

impl App {
    pub fn new(controller: ConversationController, backend_url: impl Into<String>) -> Self {
        Self {
            should_quit: false,
            controller,
            backend_url: backend_url.into(),
            cursor: 0,
            chat_scroll: 0,
            follow_tail: true,
            chat_height: 0,
            chat_width: 0,
            animation_frame: 0,
        }
    }

    pub fn transcript(&self) -> &[Message] {
        self.controller.transcript()
    }

    pub fn draft(&self) -> &str {
        self.controller.draft()
    }

    pub fn is_busy(&self) -> bool {
        self.controller.is_busy()
    }

    fn draft_len(&self) -> usize {
        self.draft().chars().count()
    }

    // Draft editing. Every edit goes through `update_draft` on the controller.
    pub fn insert_char(&mut self, c: char) {
        let mut draft = self.draft().to_string();
        let byte_pos = char_to_byte_index(&draft, self.cursor);
        draft.insert(byte_pos, c);
        self.controller.update_draft(draft);
        self.cursor += 1;
    }

    /// Insert pasted text; the input is single-line so line breaks become spaces
    pub fn insert_str(&mut self, text: &str) {
        let text: String = text
            .chars()
            .filter(|c| *c != '\r')
            .map(|c| if c == '\n' { ' ' } else { c })
            .collect();
        let mut draft = self.draft().to_string();
        let byte_pos = char_to_byte_index(&draft, self.cursor);
        draft.insert_str(byte_pos, &text);
        self.controller.update_draft(draft);
        self.cursor += text.chars().count();
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let mut draft = self.draft().to_string();
            let byte_pos = char_to_byte_index(&draft, self.cursor);
            draft.remove(byte_pos);
            self.controller.update_draft(draft);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.draft_len() {
            let mut draft = self.draft().to_string();
            let byte_pos = char_to_byte_index(&draft, self.cursor);
            draft.remove(byte_pos);
            self.controller.update_draft(draft);
        }
    }

    pub fn clear_draft(&mut self) {
        self.controller.update_draft(String::new());
        self.cursor = 0;
    }

    pub fn cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.draft_len());
    }

    pub fn cursor_home(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.cursor = self.draft_len();
    }

    pub fn submit(&mut self) -> bool {
        if !self.controller.submit() {
            return false;
        }
        self.cursor = 0;
        self.follow_tail = true;
        self.scroll_to_bottom();
        true
    }

    /// Pick up finished replies and advance the loading animation
    pub fn on_tick(&mut self) {
        if self.controller.try_reconcile() {
            self.follow_tail = true;
        }
        if self.is_busy() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        } else {
            self.animation_frame = 0;
        }
        if self.follow_tail {
            self.scroll_to_bottom();
        }
    }

    // Transcript scrolling
    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
        self.follow_tail = false;
    }

    pub fn scroll_down(&mut self, lines: u16) {
        let max = self.max_scroll();
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(max);
        self.follow_tail = self.chat_scroll >= max;
    }

    pub fn page_size(&self) -> u16 {
        (self.visible_height() / 2).max(1)
    }

    pub fn scroll_to_bottom(&mut self) {
        self.chat_scroll = self.max_scroll();
    }

    fn visible_height(&self) -> u16 {
        if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        }
    }

    /// Largest usable scroll offset; the widget takes a `u16`, so longer
    /// transcripts are clamped.
    fn max_scroll(&self) -> u16 {
        let max = self
            .total_chat_lines()
            .saturating_sub(self.visible_height() as usize);
        u16::try_from(max).unwrap_or(u16::MAX)
    }

    /// Rendered line count of the transcript at the current chat width,
    /// wrapped exactly as the chat widget wraps it
    pub fn total_chat_lines(&self) -> usize {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 { self.chat_width } else { 50 };
        ui::chat_paragraph(self).line_count(wrap_width)
    }
}
