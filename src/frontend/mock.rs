//! An in-memory `AstCursor` tree, used only by tests, so the visitor's
//! logic (spec §4.2) can be exercised against the literal scenarios of
//! spec §8 without a libclang installation.

use super::{AstCursor, CursorKind, Location};

#[derive(Clone, Debug)]
pub struct MockCursor {
    pub kind: CursorKind,
    pub name: String,
    pub global: bool,
    pub inline: bool,
    pub file: Option<String>,
    pub line: u32,
    pub column: u32,
    pub referenced: Option<Box<MockCursor>>,
    pub children: Vec<MockCursor>,
}

impl MockCursor {
    pub fn new(kind: CursorKind) -> Self {
        MockCursor {
            kind,
            name: String::new(),
            global: true,
            inline: false,
            file: None,
            line: 0,
            column: 0,
            referenced: None,
            children: Vec::new(),
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_owned();
        self
    }

    pub fn at(mut self, file: &str, line: u32, column: u32) -> Self {
        self.file = Some(file.to_owned());
        self.line = line;
        self.column = column;
        self
    }

    pub fn global(mut self, global: bool) -> Self {
        self.global = global;
        self
    }

    pub fn inline(mut self, inline: bool) -> Self {
        self.inline = inline;
        self
    }

    pub fn referencing(mut self, target: MockCursor) -> Self {
        self.referenced = Some(Box::new(target));
        self
    }

    pub fn with_children(mut self, children: Vec<MockCursor>) -> Self {
        self.children = children;
        self
    }
}

impl AstCursor for MockCursor {
    fn kind(&self) -> CursorKind {
        self.kind
    }

    fn display_name(&self) -> String {
        self.name.clone()
    }

    fn is_global_storage(&self) -> bool {
        self.global
    }

    fn is_inline(&self) -> bool {
        self.inline
    }

    fn location(&self) -> Location {
        Location {
            file: self.file.clone(),
            line: self.line,
            column: self.column,
        }
    }

    fn referenced(&self) -> Option<Self> {
        self.referenced.as_deref().cloned()
    }

    fn visit_children(&self, f: &mut dyn FnMut(&Self)) {
        for child in &self.children {
            f(child);
        }
    }
}
