//! Tokenizer for Style and ControlTheme selectors
//!
//! Grammar: `Type.class:pseudo[Prop=Value] /template/ > Child #name :is(...) :not(...)`.
//! Pseudo-class functions open a new scope on an explicit stack bounded by
//! [`MAX_FUNCTION_DEPTH`].

pub const MAX_FUNCTION_DEPTH: usize = 32;

/// Token being typed at the end of the selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorStatement {
    /// Start of a selector, after `,` or just inside `:is(`
    Start,
    TypeName,
    /// `.class`
    Class,
    /// `#name`
    Name,
    /// `:pseudo` or a function name such as `:not`
    Colon,
    /// `[Property`
    Property,
    /// `[Property=Value`
    Value,
    /// Inside `/template/`
    Template,
    /// After `>` or a whitespace combinator
    Traversal,
    /// After a closed construct (`]`, `)`, `^`, `/template/`)
    Middle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorParseState<'a> {
    pub statement: SelectorStatement,
    pub previous_statement: SelectorStatement,
    /// Last type token of the innermost open scope
    pub type_name: Option<&'a str>,
    pub class: Option<&'a str>,
    pub name: Option<&'a str>,
    pub pseudo_class: Option<&'a str>,
    pub property_name: Option<&'a str>,
    /// Innermost open pseudo-class function
    pub function_name: Option<&'a str>,
    pub function_depth: usize,
    /// Offset where the token being typed starts
    pub token_start: usize,
}

impl<'a> SelectorParseState<'a> {
    /// Text of the token being typed
    pub fn token<'t>(&self, text: &'t str) -> &'t str {
        &text[self.token_start.min(text.len())..]
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Scope<'a> {
    function_name: Option<&'a str>,
    type_name: Option<&'a str>,
}

struct Tokenizer<'a> {
    text: &'a str,
    statement: SelectorStatement,
    previous_statement: SelectorStatement,
    token_start: usize,
    scopes: Vec<Scope<'a>>,
    class: Option<&'a str>,
    name: Option<&'a str>,
    pseudo_class: Option<&'a str>,
    property_name: Option<&'a str>,
}

impl<'a> Tokenizer<'a> {
    fn scope(&mut self) -> &mut Scope<'a> {
        // The root scope is never popped
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    fn enter(&mut self, statement: SelectorStatement, token_start: usize) {
        if self.statement != statement {
            self.previous_statement = self.statement;
        }
        self.statement = statement;
        self.token_start = token_start;
    }

    /// Record the token ending at `end` in the field its statement feeds
    fn finish_token(&mut self, end: usize) {
        let text = self.text;
        let token = &text[self.token_start.min(end)..end];
        match self.statement {
            SelectorStatement::TypeName if !token.is_empty() => {
                self.scope().type_name = Some(token);
            }
            SelectorStatement::Class => self.class = Some(token),
            SelectorStatement::Name => self.name = Some(token),
            SelectorStatement::Colon => self.pseudo_class = Some(token),
            SelectorStatement::Property => self.property_name = Some(token),
            _ => {}
        }
    }

    fn run(&mut self) {
        let text = self.text;
        let bytes = text.as_bytes();
        for (i, &c) in bytes.iter().enumerate() {
            match self.statement {
                SelectorStatement::Template => {
                    if c == b'/' {
                        self.enter(SelectorStatement::Middle, i + 1);
                    }
                    continue;
                }
                SelectorStatement::Value => {
                    if c == b']' {
                        self.enter(SelectorStatement::Middle, i + 1);
                    }
                    continue;
                }
                _ => {}
            }

            match c {
                b'.' => {
                    self.finish_token(i);
                    self.enter(SelectorStatement::Class, i + 1);
                }
                b'#' => {
                    self.finish_token(i);
                    self.enter(SelectorStatement::Name, i + 1);
                }
                b':' => {
                    self.finish_token(i);
                    self.enter(SelectorStatement::Colon, i + 1);
                }
                b'[' => {
                    self.finish_token(i);
                    self.enter(SelectorStatement::Property, i + 1);
                }
                b'=' if self.statement == SelectorStatement::Property => {
                    self.finish_token(i);
                    self.enter(SelectorStatement::Value, i + 1);
                }
                b'(' if self.statement == SelectorStatement::Colon => {
                    if self.scopes.len() > MAX_FUNCTION_DEPTH {
                        tracing::trace!("selector function nesting limit reached at {}", i);
                        return;
                    }
                    let function_name = &text[self.token_start..i];
                    self.scopes.push(Scope {
                        function_name: Some(function_name),
                        type_name: None,
                    });
                    self.enter(SelectorStatement::Start, i + 1);
                }
                b')' => {
                    self.finish_token(i);
                    if self.scopes.len() > 1 {
                        if let Some(closed) = self.scopes.pop() {
                            // `:is(Button)` narrows the enclosing selector to that type
                            let parent = self.scope();
                            if closed.function_name == Some("is") && parent.type_name.is_none() {
                                parent.type_name = closed.type_name;
                            }
                        }
                    }
                    self.enter(SelectorStatement::Middle, i + 1);
                }
                b'/' => {
                    self.finish_token(i);
                    self.enter(SelectorStatement::Template, i + 1);
                }
                b'>' => {
                    self.finish_token(i);
                    self.enter(SelectorStatement::Traversal, i + 1);
                }
                b',' => {
                    self.finish_token(i);
                    self.scope().type_name = None;
                    self.class = None;
                    self.pseudo_class = None;
                    self.enter(SelectorStatement::Start, i + 1);
                }
                b'^' => {
                    self.finish_token(i);
                    self.enter(SelectorStatement::Middle, i + 1);
                }
                c if c.is_ascii_whitespace() => {
                    if !matches!(
                        self.statement,
                        SelectorStatement::Start | SelectorStatement::Traversal
                    ) {
                        self.finish_token(i);
                        self.enter(SelectorStatement::Traversal, i + 1);
                    } else {
                        self.token_start = i + 1;
                    }
                }
                _ => {
                    if matches!(
                        self.statement,
                        SelectorStatement::Start
                            | SelectorStatement::Traversal
                            | SelectorStatement::Middle
                    ) {
                        self.enter(SelectorStatement::TypeName, i);
                    }
                }
            }
        }
    }
}

/// Parse a selector up to its end
pub fn parse(text: &str) -> SelectorParseState<'_> {
    let mut tokenizer = Tokenizer {
        text,
        statement: SelectorStatement::Start,
        previous_statement: SelectorStatement::Start,
        token_start: 0,
        scopes: vec![Scope::default()],
        class: None,
        name: None,
        pseudo_class: None,
        property_name: None,
    };
    tokenizer.run();
    tokenizer.finish_token(text.len());

    let scope = tokenizer.scopes.last().copied().unwrap_or_default();
    SelectorParseState {
        statement: tokenizer.statement,
        previous_statement: tokenizer.previous_statement,
        type_name: scope.type_name,
        class: tokenizer.class,
        name: tokenizer.name,
        pseudo_class: tokenizer.pseudo_class,
        property_name: tokenizer.property_name,
        function_name: scope.function_name,
        function_depth: tokenizer.scopes.len() - 1,
        token_start: tokenizer.token_start.min(text.len()),
    }
}
