//! Nested block comments
//!
//! `/* ... */` comments nest. Opening the outermost comment records the
//! parse state to resume once the comment is closed; nested comments only
//! record their end token.

/// One open comment
#[derive(Debug, Clone)]
struct CommentFrame<S> {
    /// Token closing this comment: the opening token reversed
    end: String,
    /// State to resume when this frame closes; set on the outermost frame
    resume: Option<S>,
}

/// Stack of open block comments
#[derive(Debug, Clone)]
pub struct CommentStack<S> {
    frames: Vec<CommentFrame<S>>,
}

impl<S> Default for CommentStack<S> {
    fn default() -> Self {
        Self { frames: Vec::new() }
    }
}

pub const BLOCK_COMMENT_START: &str = "/*";
pub const LINE_COMMENT: &str = "//";

fn closing_token(start: &str) -> String {
    start.chars().rev().collect()
}

impl<S> CommentStack<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a comment started by `start` (already consumed), to resume
    /// `resume` once it closes
    pub fn open(&mut self, start: &str, resume: S) {
        self.frames.push(CommentFrame {
            end: closing_token(start),
            resume: Some(resume),
        });
    }

    pub fn is_open(&self) -> bool {
        !self.frames.is_empty()
    }

    /// Number of comments currently open
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Skip comment text.
    ///
    /// Returns the state to resume and the text after the closing token
    /// once the outermost comment closes, or `None` if `text` ends inside
    /// the comment.
    pub fn scan<'t>(&mut self, text: &'t str) -> Option<(S, &'t str)> {
        let mut i = 0;
        while i < text.len() {
            let rest = &text[i..];
            let closes = self
                .frames
                .last()
                .is_some_and(|top| rest.starts_with(top.end.as_str()));
            if closes {
                let frame = self.frames.pop()?;
                i += frame.end.len();
                if let Some(resume) = frame.resume {
                    self.frames.clear();
                    return Some((resume, &text[i..]));
                }
                continue;
            }
            if rest.starts_with(BLOCK_COMMENT_START) {
                self.frames.push(CommentFrame {
                    end: closing_token(BLOCK_COMMENT_START),
                    resume: None,
                });
                i += BLOCK_COMMENT_START.len();
                continue;
            }
            i += rest.chars().next().map_or(1, char::len_utf8);
        }
        None
    }
}

/// Remove comments from a command line.
///
/// String literals are left alone. A block comment left open at the end of
/// the line stays on `comments` and swallows the start of the next line.
pub fn strip_comments(line: &str, comments: &mut CommentStack<()>) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;

    if comments.is_open() {
        match comments.scan(rest) {
            Some(((), after)) => {
                out.push(' ');
                rest = after;
            }
            None => return out,
        }
    }

    let mut in_string = false;
    let mut chars = rest.char_indices();
    while let Some((i, c)) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                '\\' => {
                    if let Some((_, escaped)) = chars.next() {
                        out.push(escaped);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        let tail = &rest[i..];
        if tail.starts_with(LINE_COMMENT) {
            break;
        }
        if tail.starts_with(BLOCK_COMMENT_START) {
            comments.open(BLOCK_COMMENT_START, ());
            let inner = &tail[BLOCK_COMMENT_START.len()..];
            if let Some(((), after)) = comments.scan(inner) {
                out.push(' ');
                out.push_str(&strip_comments(after, comments));
            }
            return out;
        }
        if c == '"' {
            in_string = true;
        }
        out.push(c);
    }
    out
}
