use eframe::egui;

use crate::dialect::Dialect;

const KEYWORD: egui::Color32 = egui::Color32::from_rgb(86, 156, 214); // Blue (#569CD6)
const CONTROL: egui::Color32 = egui::Color32::from_rgb(197, 134, 192); // Purple (#C586C0)
const TYPE_NAME: egui::Color32 = egui::Color32::from_rgb(78, 201, 176); // Teal (#4EC9B0)
const STRING: egui::Color32 = egui::Color32::from_rgb(206, 145, 120);
const NUMBER: egui::Color32 = egui::Color32::from_rgb(181, 206, 168);
const COMMENT: egui::Color32 = egui::Color32::from_rgb(106, 153, 85);
const GLOBAL: egui::Color32 = egui::Color32::from_rgb(156, 220, 254); // Light Blue (#9CDCFE)
const OPERATOR: egui::Color32 = egui::Color32::from_rgb(212, 212, 212);
const PLAIN: egui::Color32 = egui::Color32::LIGHT_GRAY;

// Rainbow bracket colors (Pastel/Neon for dark theme)
const RAINBOW: [egui::Color32; 6] = [
    egui::Color32::from_rgb(255, 215, 0),
    egui::Color32::from_rgb(218, 112, 214),
    egui::Color32::from_rgb(23, 159, 255),
    egui::Color32::from_rgb(255, 140, 100),
    egui::Color32::from_rgb(120, 220, 120),
    egui::Color32::from_rgb(255, 120, 180),
];

const FONT_SIZE: f32 = 14.0;

fn word_color(word: &str, dialect: Dialect) -> egui::Color32 {
    match word {
        "const" | "let" | "var" | "function" | "class" | "extends" | "new" | "this" | "super"
        | "typeof" | "instanceof" | "in" | "of" | "void" | "delete" | "async" | "static"
        | "get" | "set" | "true" | "false" | "null" | "undefined" => KEYWORD,

        "if" | "else" | "for" | "while" | "do" | "switch" | "case" | "default" | "break"
        | "continue" | "return" | "throw" | "try" | "catch" | "finally" | "await" | "yield" => {
            CONTROL
        }

        "console" | "Math" | "JSON" | "Promise" | "Object" | "Array" | "String" | "Number"
        | "Boolean" | "Date" | "Map" | "Set" | "Symbol" | "Error" | "RegExp" => GLOBAL,

        _ if dialect.is_typed() => match word {
            "interface" | "type" | "enum" | "implements" | "public" | "private" | "protected"
            | "readonly" | "abstract" | "declare" | "as" | "satisfies" | "keyof" | "namespace" => {
                KEYWORD
            }
            "string" | "number" | "boolean" | "any" | "unknown" | "never" | "object" | "bigint" => {
                TYPE_NAME
            }
            _ => PLAIN,
        },

        _ => PLAIN,
    }
}

/// Colours JavaScript or TypeScript source. The job's text is always the
/// input unchanged, so galley char indices match the buffer.
pub(crate) fn highlight_code(job: &mut egui::text::LayoutJob, code: &str, dialect: Dialect) {
    let font_id = egui::FontId::monospace(FONT_SIZE);

    let mut chars = code.char_indices().peekable();
    let mut last_idx = 0;
    let mut bracket_depth: usize = 0;

    while let Some((idx, c)) = chars.next() {
        // Comments
        if c == '/' && matches!(chars.peek(), Some((_, '/' | '*'))) {
            append_text(job, &code[last_idx..idx], &font_id, PLAIN);
            let block = matches!(chars.next(), Some((_, '*')));
            let mut end = code.len();
            let mut prev = ' ';
            while let Some(&(i, next_c)) = chars.peek() {
                if !block && next_c == '\n' {
                    end = i;
                    break;
                }
                chars.next();
                if block && prev == '*' && next_c == '/' {
                    end = i + 1;
                    break;
                }
                prev = next_c;
            }
            append_text(job, &code[idx..end], &font_id, COMMENT);
            last_idx = end;
            continue;
        }

        // Strings and template literals
        if c == '"' || c == '\'' || c == '`' {
            append_text(job, &code[last_idx..idx], &font_id, PLAIN);
            let mut end = code.len();
            let mut escaped = false;
            while let Some((i, next_c)) = chars.next() {
                if escaped {
                    escaped = false;
                } else if next_c == '\\' {
                    escaped = true;
                } else if next_c == c {
                    end = i + 1;
                    break;
                } else if next_c == '\n' && c != '`' {
                    end = i;
                    break;
                }
            }
            append_text(job, &code[idx..end], &font_id, STRING);
            last_idx = end;
            continue;
        }

        // Brackets (Rainbow)
        if "()[]{}".contains(c) {
            append_text(job, &code[last_idx..idx], &font_id, PLAIN);
            let color_idx = if ")]}".contains(c) {
                bracket_depth = bracket_depth.saturating_sub(1);
                bracket_depth
            } else {
                bracket_depth += 1;
                bracket_depth - 1
            };
            append_text(job, &code[idx..idx + 1], &font_id, RAINBOW[color_idx % RAINBOW.len()]);
            last_idx = idx + 1;
            continue;
        }

        // Identifiers and keywords
        if c.is_alphabetic() || c == '_' || c == '$' {
            append_text(job, &code[last_idx..idx], &font_id, PLAIN);
            let mut end = idx + c.len_utf8();
            while let Some(&(i, next_c)) = chars.peek() {
                if next_c.is_alphanumeric() || next_c == '_' || next_c == '$' {
                    end = i + next_c.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            let word = &code[idx..end];
            append_text(job, word, &font_id, word_color(word, dialect));
            last_idx = end;
            continue;
        }

        // Numbers
        if c.is_ascii_digit() {
            append_text(job, &code[last_idx..idx], &font_id, PLAIN);
            let mut end = idx + 1;
            while let Some(&(i, next_c)) = chars.peek() {
                if next_c.is_ascii_alphanumeric() || next_c == '.' || next_c == '_' {
                    end = i + 1;
                    chars.next();
                } else {
                    break;
                }
            }
            append_text(job, &code[idx..end], &font_id, NUMBER);
            last_idx = end;
            continue;
        }

        if "=+-*/%<>!&|?:,;.".contains(c) {
            append_text(job, &code[last_idx..idx], &font_id, PLAIN);
            append_text(job, &code[idx..idx + 1], &font_id, OPERATOR);
            last_idx = idx + 1;
        }
    }

    // Flush remaining
    append_text(job, &code[last_idx..], &font_id, PLAIN);
}

fn append_text(job: &mut egui::text::LayoutJob, text: &str, font_id: &egui::FontId, color: egui::Color32) {
    if text.is_empty() {
        return;
    }
    job.append(
        text,
        0.0,
        egui::text::TextFormat {
            font_id: font_id.clone(),
            color,
            ..Default::default()
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn colour_of(job: &egui::text::LayoutJob, needle: &str) -> Option<egui::Color32> {
        let at = job.text.find(needle)?;
        job.sections
            .iter()
            .find(|s| s.byte_range.start <= at && at < s.byte_range.end)
            .map(|s| s.format.color)
    }

    #[test]
    fn text_is_preserved() {
        for src in [
            "const s = 'it\\'s'; // done\n/* block\n comment */ let n = 0x1F;",
            "const greeting = `héllo ${name}`;\nconsole.log(greeting)",
            "unterminated 'string\nnext",
            "",
        ] {
            let mut job = egui::text::LayoutJob::default();
            highlight_code(&mut job, src, Dialect::JavaScript);
            assert_eq!(job.text, src);
        }
    }

    #[test]
    fn typescript_words_only_in_typescript() {
        let src = "interface Point { x: number }";
        let mut js = egui::text::LayoutJob::default();
        highlight_code(&mut js, src, Dialect::JavaScript);
        let mut ts = egui::text::LayoutJob::default();
        highlight_code(&mut ts, src, Dialect::TypeScript);

        assert_eq!(colour_of(&js, "interface"), Some(PLAIN));
        assert_eq!(colour_of(&ts, "interface"), Some(KEYWORD));
        assert_eq!(colour_of(&ts, "number"), Some(TYPE_NAME));
    }

    #[test]
    fn comments_and_strings() {
        let mut job = egui::text::LayoutJob::default();
        highlight_code(&mut job, "return 'x' // note", Dialect::JavaScript);
        assert_eq!(colour_of(&job, "return"), Some(CONTROL));
        assert_eq!(colour_of(&job, "'x'"), Some(STRING));
        assert_eq!(colour_of(&job, "// note"), Some(COMMENT));
    }
}
