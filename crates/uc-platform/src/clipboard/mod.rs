mod arboard_clipboard;

pub use arboard_clipboard::ArboardClipboard;
