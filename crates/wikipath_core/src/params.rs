use std::fmt;

/// A reference to a page in the hyperlink graph, usually a full article URL.
pub type PageRef = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMethod {
    #[default]
    Bfs,
    AStar,
}

impl SearchMethod {
    /// Name used on the wire.
    pub fn as_wire(self) -> &'static str {
        match self {
            SearchMethod::Bfs => "bfs",
            SearchMethod::AStar => "a_star",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            SearchMethod::Bfs => "Breadth-first search",
            SearchMethod::AStar => "A* search",
        }
    }
}

impl fmt::Display for SearchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// Scoring used by A*; ignored for breadth-first searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Heuristic {
    #[default]
    Links,
    Categories,
}

impl Heuristic {
    pub fn as_wire(self) -> &'static str {
        match self {
            Heuristic::Links => "links",
            Heuristic::Categories => "categories",
        }
    }
}

impl fmt::Display for Heuristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// What the user asked to search for. Immutable once submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParameters {
    pub start: PageRef,
    pub finish: PageRef,
    pub method: SearchMethod,
    pub heuristic: Heuristic,
}

impl SearchParameters {
    /// Breadth-first search with the default heuristic (`links`).
    pub fn new(start: impl Into<PageRef>, finish: impl Into<PageRef>) -> Self {
        Self {
            start: start.into(),
            finish: finish.into(),
            method: SearchMethod::default(),
            heuristic: Heuristic::default(),
        }
    }

    pub fn with_method(mut self, method: SearchMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_heuristic(mut self, heuristic: Heuristic) -> Self {
        self.heuristic = heuristic;
        self
    }

    /// The heuristic to send, which only exists for A*.
    pub fn effective_heuristic(&self) -> Option<Heuristic> {
        match self.method {
            SearchMethod::AStar => Some(self.heuristic),
            SearchMethod::Bfs => None,
        }
    }
}
