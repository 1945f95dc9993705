use super::{NodeId, Tree, TreeNode};
use crate::error::{SelError, SelResult};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

pub fn read_newick_file(path: impl AsRef<Path>) -> SelResult<Tree> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    parse_newick(&text, &path.display().to_string())
}

/// Parses a single Newick tree. Missing branch lengths default to 0; bracketed
/// comments are skipped; labels may be single-quoted.
pub fn parse_newick(text: &str, source_name: &str) -> SelResult<Tree> {
    let mut parser = Parser {
        bytes: text.as_bytes(),
        pos: 0,
        source_name,
        nodes: Vec::new(),
    };
    parser.skip_ignorable();
    let root = parser.parse_subtree(None)?;
    parser.skip_ignorable();
    match parser.peek() {
        Some(b';') => parser.pos += 1,
        Some(c) => return Err(parser.error(format!("unexpected '{}' after tree", c as char))),
        None => return Err(parser.error("missing ';' at end of tree".to_string())),
    }
    parser.skip_ignorable();
    if parser.peek().is_some() {
        return Err(parser.error("trailing content after ';'".to_string()));
    }

    let mut nodes = parser.nodes;
    // Root branch length carries no meaning.
    nodes[root].branch_length = 0.0;
    Tree::new(nodes, root)
}

pub fn write_newick(tree: &Tree) -> String {
    let mut out = String::new();
    write_subtree(tree, tree.root(), &mut out);
    out.push(';');
    out
}

pub fn write_newick_file(tree: &Tree, path: impl AsRef<Path>) -> SelResult<()> {
    let mut text = write_newick(tree);
    text.push('\n');
    fs::write(path, text)?;
    Ok(())
}

fn write_subtree(tree: &Tree, id: NodeId, out: &mut String) {
    let node = tree.node(id);
    if !node.children.is_empty() {
        out.push('(');
        for (k, &child) in node.children.iter().enumerate() {
            if k > 0 {
                out.push(',');
            }
            write_subtree(tree, child, out);
        }
        out.push(')');
    }
    out.push_str(&quote_label(&node.name));
    if node.parent.is_some() {
        let _ = write!(out, ":{}", node.branch_length);
    }
}

fn quote_label(name: &str) -> String {
    let needs_quotes = name
        .chars()
        .any(|c| c.is_whitespace() || "():;,[]'".contains(c));
    if needs_quotes {
        format!("'{}'", name.replace('\'', "''"))
    } else {
        name.to_string()
    }
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
    source_name: &'a str,
    nodes: Vec<TreeNode>,
}

impl Parser<'_> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn line(&self) -> usize {
        1 + self.bytes[..self.pos.min(self.bytes.len())]
            .iter()
            .filter(|&&b| b == b'\n')
            .count()
    }

    fn error(&self, message: String) -> SelError {
        SelError::Parse {
            source_name: self.source_name.to_string(),
            line: self.line(),
            message,
        }
    }

    fn skip_ignorable(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_ascii_whitespace() => self.pos += 1,
                Some(b'[') => {
                    while let Some(c) = self.peek() {
                        self.pos += 1;
                        if c == b']' {
                            break;
                        }
                    }
                }
                _ => return,
            }
        }
    }

    fn parse_subtree(&mut self, parent: Option<NodeId>) -> SelResult<NodeId> {
        let id = self.nodes.len();
        self.nodes.push(TreeNode {
            name: String::new(),
            parent,
            children: Vec::new(),
            branch_length: 0.0,
        });

        self.skip_ignorable();
        if self.peek() == Some(b'(') {
            self.pos += 1;
            loop {
                let child = self.parse_subtree(Some(id))?;
                self.nodes[id].children.push(child);
                self.skip_ignorable();
                match self.peek() {
                    Some(b',') => self.pos += 1,
                    Some(b')') => {
                        self.pos += 1;
                        break;
                    }
                    Some(c) => return Err(self.error(format!("expected ',' or ')', found '{}'", c as char))),
                    None => return Err(self.error("unbalanced parentheses".to_string())),
                }
            }
        }

        self.skip_ignorable();
        self.nodes[id].name = self.parse_label()?;
        self.skip_ignorable();
        if self.peek() == Some(b':') {
            self.pos += 1;
            self.skip_ignorable();
            self.nodes[id].branch_length = self.parse_length()?;
        }

        if self.nodes[id].children.is_empty() && self.nodes[id].name.is_empty() {
            return Err(self.error("tip without a name".to_string()));
        }
        Ok(id)
    }

    fn parse_label(&mut self) -> SelResult<String> {
        if self.peek() == Some(b'\'') {
            self.pos += 1;
            let mut label = Vec::new();
            loop {
                match self.peek() {
                    Some(b'\'') if self.bytes.get(self.pos + 1) == Some(&b'\'') => {
                        label.push(b'\'');
                        self.pos += 2;
                    }
                    Some(b'\'') => {
                        self.pos += 1;
                        break;
                    }
                    Some(c) => {
                        label.push(c);
                        self.pos += 1;
                    }
                    None => return Err(self.error("unterminated quoted label".to_string())),
                }
            }
            return String::from_utf8(label).map_err(|e| self.error(e.to_string()));
        }

        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_whitespace() || b"():;,[".contains(&c) {
                break;
            }
            self.pos += 1;
        }
        let raw = String::from_utf8_lossy(&self.bytes[start..self.pos]);
        // Unquoted underscores stand for blanks in Newick, but taxon names in
        // alignments keep them, so they are left as-is.
        Ok(raw.into_owned())
    }

    fn parse_length(&mut self) -> SelResult<f64> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || b"+-.eE".contains(&c) {
                self.pos += 1;
            } else {
                break;
            }
        }
        let raw = std::str::from_utf8(&self.bytes[start..self.pos]).unwrap_or("");
        let value: f64 = raw
            .parse()
            .map_err(|_| self.error(format!("invalid branch length '{}'", raw)))?;
        if !value.is_finite() || value < 0.0 {
            return Err(self.error(format!("branch length must be >= 0, found {}", value)));
        }
        Ok(value)
    }
}
