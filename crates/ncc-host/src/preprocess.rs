//! Source preprocessor.
//!
//! The compiler module does not understand preprocessor directives or
//! comments, so the host strips them first and splices in the extern
//! declarations for the headers it knows about.

use regex::Regex;

use crate::error::BridgeResult;

/// Declarations substituted for `#include <iostream>`.
pub const IOSTREAM: &str = "\
extern \"C\" void puts(char *address, u32 size);
extern \"C\" void put(u32 character);
extern \"C\" void putu32(u32 num);
extern \"C\" void puti32(i32 num);
extern \"C\" void putf32(f32 num);
extern \"C\" void putf64(f64 num);
extern \"C\" void flushStdout();
";

/// Declaration substituted for `#include <canvas>`.
pub const CANVAS: &str = "extern \"C\" void drawCircle(float x, float y, float r);";

#[derive(Debug, Clone)]
pub struct Preprocessor {
    line_splice: Regex,
    comment: Regex,
    iostream: Regex,
    canvas: Regex,
    directive: Regex,
}

impl Preprocessor {
    pub fn new() -> BridgeResult<Self> {
        Ok(Self {
            line_splice: Regex::new(r"\\\r?\n")?,
            comment: Regex::new(r"//[^\n]*|/\*(?s:.*?)\*/")?,
            iostream: Regex::new(r"(?m)#include\s*<iostream>[ \t\r]*$")?,
            canvas: Regex::new(r"(?m)#include\s*<canvas>[ \t\r]*$")?,
            directive: Regex::new(r"(?m)#[^\n]*$")?,
        })
    }

    /// Apply every rewrite, in order, to `source`.
    pub fn run(&self, source: &str) -> String {
        let text = self.line_splice.replace_all(source, "");
        let text = self.comment.replace_all(&text, "");
        let text = self.iostream.replace_all(&text, IOSTREAM.trim_end());
        let text = self.canvas.replace_all(&text, CANVAS);
        self.directive.replace_all(&text, "").into_owned()
    }
}
