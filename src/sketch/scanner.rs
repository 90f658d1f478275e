//! Line scanner that finds function definitions in sketch code.
//!
//! This is a heuristic, not a C++ parser. It tracks whether it is inside a
//! block comment and how deep it is in braces; any header text seen at brace
//! depth zero right before a body opens is taken as a function declarator.
//! Nested block comments and declarators split by preprocessor conditionals
//! are not understood. Out-of-class member definitions (`void Motor::spin()`)
//! are skipped, since they cannot be declared at file scope.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Normal,
    InBlockComment,
}

/// How a single line was treated by the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineClass {
    /// Only comment text.
    Comment,
    /// Starts with `#`.
    Directive,
    Blank,
    /// Swallowed by an open block comment.
    InComment,
    /// Inside a body, or closing one.
    Body,
    /// Ends with `;` at top level.
    Statement,
    /// Opens a body from top level; its header text was retained.
    Declarator,
    /// Top-level text that may continue a multi-line declarator.
    Header,
}

#[derive(Debug)]
pub struct DeclarationScanner {
    state: ScanState,
    depth: usize,
    pending: String,
    declarators: Vec<String>,
    open_declared: bool,
    just_closed: bool,
}

impl Default for DeclarationScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl DeclarationScanner {
    pub fn new() -> Self {
        Self {
            state: ScanState::Normal,
            depth: 0,
            pending: String::new(),
            declarators: Vec::new(),
            open_declared: false,
            just_closed: false,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Declarator headers found so far, without the trailing `;`.
    pub fn declarators(&self) -> &[String] {
        &self.declarators
    }

    /// Forward declarations, in discovery order.
    pub fn declarations(&self) -> Vec<String> {
        self.declarators.iter().map(|d| format!("{d};")).collect()
    }

    pub fn scan<'a, I>(&mut self, lines: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for line in lines {
            self.scan_line(line);
        }
    }

    pub fn scan_line(&mut self, line: &str) -> LineClass {
        let trimmed = line.trim();

        if is_comment_line(trimmed) {
            return LineClass::Comment;
        }
        if trimmed.starts_with('#') {
            return LineClass::Directive;
        }
        if trimmed.is_empty() {
            return LineClass::Blank;
        }

        let rest = match self.state {
            ScanState::InBlockComment => match line.find("*/") {
                Some(end) => {
                    self.state = ScanState::Normal;
                    &line[end + 2..]
                }
                None => return LineClass::InComment,
            },
            ScanState::Normal => line,
        };

        let depth_before = self.depth;
        let mut opened = false;
        let mut terminated = false;
        let mut top_text = false;

        let chars: Vec<char> = rest.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            let next = chars.get(i + 1).copied();
            match c {
                '/' if next == Some('/') => break,
                '/' if next == Some('*') => match find_block_end(&chars, i + 2) {
                    Some(end) => {
                        if self.depth == 0 {
                            self.pending.push(' ');
                        }
                        i = end;
                        continue;
                    }
                    None => {
                        self.state = ScanState::InBlockComment;
                        break;
                    }
                },
                '"' | '\'' => {
                    let end = literal_end(&chars, i);
                    if self.depth == 0 {
                        self.pending.extend(&chars[i..end]);
                        self.just_closed = false;
                        top_text = true;
                    }
                    i = end;
                    continue;
                }
                '{' => {
                    if self.depth == 0 {
                        self.open_body();
                        opened = true;
                    }
                    self.depth += 1;
                }
                '}' => {
                    if self.depth > 0 {
                        self.depth -= 1;
                        if self.depth == 0 {
                            self.just_closed = self.open_declared;
                        }
                    }
                }
                ';' if self.depth == 0 => {
                    if self.just_closed {
                        // `= { ... };` or `struct X { ... };` rather than a function body
                        self.declarators.pop();
                    }
                    self.just_closed = false;
                    self.pending.clear();
                    terminated = true;
                }
                _ if self.depth == 0 => {
                    if !c.is_whitespace() {
                        self.just_closed = false;
                        top_text = true;
                    }
                    self.pending.push(c);
                }
                _ => {}
            }
            i += 1;
        }

        if self.depth == 0 {
            self.pending.push(' ');
        }

        if opened {
            LineClass::Declarator
        } else if terminated {
            LineClass::Statement
        } else if depth_before > 0 || self.depth > 0 {
            LineClass::Body
        } else if top_text {
            LineClass::Header
        } else {
            LineClass::Comment
        }
    }

    /// A body opens at depth zero: the pending header becomes a declarator.
    fn open_body(&mut self) {
        let header = collapse_whitespace(&self.pending);
        self.pending.clear();
        self.just_closed = false;
        self.open_declared = looks_like_function(&header);
        if self.open_declared {
            self.declarators.push(header);
        }
    }
}

/// `// ...`, or a single block comment that closes exactly at the line end.
fn is_comment_line(trimmed: &str) -> bool {
    if trimmed.starts_with("//") {
        return true;
    }
    let Some(body) = trimmed.strip_prefix("/*") else {
        return false;
    };
    body.find("*/").is_some_and(|end| end + 2 == body.len())
}

fn looks_like_function(header: &str) -> bool {
    let Some(paren) = header.find('(') else {
        return false;
    };
    header.ends_with(|c: char| c == ')' || c.is_alphanumeric() || c == '_')
        && parens_balanced(header)
        && !is_qualified_name(&header[..paren])
}

fn parens_balanced(text: &str) -> bool {
    let mut depth = 0i32;
    for c in text.chars() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

/// True when the name right before the parameter list is `Scope::name`.
fn is_qualified_name(before_paren: &str) -> bool {
    let name_part = before_paren.trim_end();
    let start = name_part
        .rfind(|c: char| c.is_whitespace() || c == '*' || c == '&')
        .map_or(0, |i| i + 1);
    name_part[start..].contains("::") || name_part[..start].trim_end().ends_with("::")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Index just past the `*/` that closes a comment starting before `from`.
fn find_block_end(chars: &[char], from: usize) -> Option<usize> {
    let mut i = from;
    while i + 1 < chars.len() {
        if chars[i] == '*' && chars[i + 1] == '/' {
            return Some(i + 2);
        }
        i += 1;
    }
    None
}

/// Index just past the string or character literal starting at `start`.
fn literal_end(chars: &[char], start: usize) -> usize {
    let quote = chars[start];
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            c if c == quote => return i + 1,
            _ => i += 1,
        }
    }
    chars.len()
}
