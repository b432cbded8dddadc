//! File tree representation, construction, and rendering.
//!
//! Trees are built with [`TreeBuilder`], an index-keyed arena: every
//! inserted path is looked up by its relative path, so inserting a file
//! never scans a directory's children. Directory nodes are created the
//! first time one of their descendants is inserted.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// The type of a filesystem node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodeKind {
    Directory,
    File {
        size: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        extension: Option<String>,
        #[serde(rename = "fileType")]
        file_type: String,
    },
}

impl NodeKind {
    /// Check if this is a directory.
    pub fn is_directory(&self) -> bool {
        matches!(self, NodeKind::Directory)
    }

    /// Check if this is a file.
    pub fn is_file(&self) -> bool {
        matches!(self, NodeKind::File { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Directory => "directory",
            NodeKind::File { .. } => "file",
        }
    }
}

/// A node in the file tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNode {
    /// File or directory name (not full path).
    pub name: String,
    /// `/`-separated path relative to the project root (`.` for the root).
    pub path: String,
    #[serde(flatten)]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<FileNode>,
}

impl FileNode {
    /// Create a new directory node.
    pub fn directory(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind: NodeKind::Directory,
            children: Vec::new(),
        }
    }

    /// Create a new file node. The type label is derived from the extension.
    pub fn file(
        name: impl Into<String>,
        path: impl Into<String>,
        extension: Option<String>,
        size: u64,
    ) -> Self {
        let file_type = file_type_label(extension.as_deref()).to_string();
        Self {
            name: name.into(),
            path: path.into(),
            kind: NodeKind::File {
                size,
                extension,
                file_type,
            },
            children: Vec::new(),
        }
    }

    /// Check if this is a directory.
    pub fn is_directory(&self) -> bool {
        self.kind.is_directory()
    }

    /// Check if this is a file.
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    /// Add a child node. Only valid for directories.
    pub fn add_child(&mut self, child: FileNode) {
        self.children.push(child);
    }

    /// Get child nodes.
    pub fn children(&self) -> &[FileNode] {
        &self.children
    }

    /// Sort children recursively: directories first, then by name.
    ///
    /// Names compare case-sensitively, so `Zeta` sorts before `alpha`.
    pub fn sort_children(&mut self) {
        self.children.sort_by(compare_siblings);
        for child in &mut self.children {
            child.sort_children();
        }
    }

    /// Get file extension if this is a file.
    pub fn extension(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::File { extension, .. } => extension.as_deref(),
            NodeKind::Directory => None,
        }
    }

    /// Get file size if this is a file.
    pub fn size(&self) -> Option<u64> {
        match &self.kind {
            NodeKind::File { size, .. } => Some(*size),
            NodeKind::Directory => None,
        }
    }

    pub fn file_type(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::File { file_type, .. } => Some(file_type),
            NodeKind::Directory => None,
        }
    }

    /// Count total files in this tree.
    pub fn file_count(&self) -> usize {
        match &self.kind {
            NodeKind::File { .. } => 1,
            NodeKind::Directory => self.children.iter().map(|c| c.file_count()).sum(),
        }
    }

    /// Count total directories in this tree.
    pub fn directory_count(&self) -> usize {
        match &self.kind {
            NodeKind::File { .. } => 0,
            NodeKind::Directory => {
                1 + self.children.iter().map(|c| c.directory_count()).sum::<usize>()
            }
        }
    }

    /// Sum of file sizes in this tree.
    pub fn total_size(&self) -> u64 {
        match &self.kind {
            NodeKind::File { size, .. } => *size,
            NodeKind::Directory => self.children.iter().map(|c| c.total_size()).sum(),
        }
    }

    /// Depth-first, pre-order traversal starting at this node.
    pub fn iter(&self) -> Preorder<'_> {
        Preorder { stack: vec![self] }
    }

    /// Find a node by its relative path.
    pub fn find(&self, path: &str) -> Option<&FileNode> {
        self.iter().find(|node| node.path == path)
    }
}

fn compare_siblings(a: &FileNode, b: &FileNode) -> Ordering {
    match (&a.kind, &b.kind) {
        (NodeKind::Directory, NodeKind::File { .. }) => Ordering::Less,
        (NodeKind::File { .. }, NodeKind::Directory) => Ordering::Greater,
        _ => a.name.cmp(&b.name),
    }
}

/// Iterator returned by [`FileNode::iter`].
pub struct Preorder<'a> {
    stack: Vec<&'a FileNode>,
}

impl<'a> Iterator for Preorder<'a> {
    type Item = &'a FileNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Lower-cased extension with a leading dot (`.ts`), if any.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
}

/// Coarse file type label for an extension such as `.ts`.
pub fn file_type_label(extension: Option<&str>) -> &'static str {
    let Some(ext) = extension else {
        return "Other";
    };
    match ext.trim_start_matches('.') {
        "rs" => "Rust",
        "ts" | "tsx" | "mts" | "cts" => "TypeScript",
        "js" | "jsx" | "mjs" | "cjs" => "JavaScript",
        "py" | "pyi" => "Python",
        "go" => "Go",
        "java" | "kt" | "kts" | "scala" => "JVM",
        "c" | "h" | "cc" | "cpp" | "cxx" | "hpp" => "C/C++",
        "cs" => "C#",
        "rb" => "Ruby",
        "php" => "PHP",
        "swift" => "Swift",
        "sh" | "bash" | "zsh" | "fish" | "ps1" => "Shell",
        "html" | "htm" | "vue" | "svelte" => "Markup",
        "css" | "scss" | "sass" | "less" => "Stylesheet",
        "md" | "mdx" | "rst" | "txt" | "adoc" => "Documentation",
        "json" | "jsonc" | "yaml" | "yml" | "toml" | "ini" | "cfg" | "conf" | "env" | "xml" => {
            "Configuration"
        }
        "csv" | "tsv" | "sql" => "Data",
        "png" | "jpg" | "jpeg" | "gif" | "svg" | "ico" | "webp" | "bmp" => "Image",
        "lock" => "Lockfile",
        _ => "Other",
    }
}

struct ArenaNode {
    name: String,
    path: String,
    kind: NodeKind,
    children: Vec<usize>,
}

/// Incremental tree construction keyed by relative path.
///
/// # Examples
///
/// ```
/// use cartographer::tree::TreeBuilder;
///
/// let mut builder = TreeBuilder::new("project");
/// builder.insert_file("src/lib.rs", 120);
/// builder.insert_file("README.md", 40);
/// let root = builder.build();
///
/// assert_eq!(root.children()[0].name, "src");
/// assert_eq!(root.file_count(), 2);
/// ```
pub struct TreeBuilder {
    nodes: Vec<ArenaNode>,
    index: HashMap<String, usize>,
}

impl TreeBuilder {
    /// Start a tree whose root directory is called `root_name`.
    pub fn new(root_name: impl Into<String>) -> Self {
        let root = ArenaNode {
            name: root_name.into(),
            path: ".".to_string(),
            kind: NodeKind::Directory,
            children: Vec::new(),
        };
        Self {
            nodes: vec![root],
            index: HashMap::new(),
        }
    }

    fn push(&mut self, parent: usize, node: ArenaNode) -> usize {
        let id = self.nodes.len();
        self.index.insert(node.path.clone(), id);
        self.nodes.push(node);
        self.nodes[parent].children.push(id);
        id
    }

    /// Insert a file by its `/`-separated relative path.
    ///
    /// Missing parent directories are created on the way. Returns `false`
    /// when the path was already present.
    pub fn insert_file(&mut self, relative: &str, size: u64) -> bool {
        let relative = relative.trim_matches('/');
        if relative.is_empty() || self.index.contains_key(relative) {
            return false;
        }

        let (parent_path, name) = match relative.rsplit_once('/') {
            Some((parent, name)) => (Some(parent), name),
            None => (None, relative),
        };
        let parent = match parent_path {
            Some(dir) => self.ensure_directory(dir),
            None => 0,
        };

        let extension = extension_of(Path::new(name));
        let file_type = file_type_label(extension.as_deref()).to_string();
        self.push(
            parent,
            ArenaNode {
                name: name.to_string(),
                path: relative.to_string(),
                kind: NodeKind::File {
                    size,
                    extension,
                    file_type,
                },
                children: Vec::new(),
            },
        );
        true
    }

    fn ensure_directory(&mut self, relative: &str) -> usize {
        let mut parent = 0;
        let mut end = 0;

        for segment in relative.split('/') {
            end += segment.len();
            let path = &relative[..end];
            parent = match self.index.get(path) {
                Some(&id) => id,
                None => self.push(
                    parent,
                    ArenaNode {
                        name: segment.to_string(),
                        path: path.to_string(),
                        kind: NodeKind::Directory,
                        children: Vec::new(),
                    },
                ),
            };
            end += 1;
        }

        parent
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Link the arena into an owned, sorted tree.
    pub fn build(self) -> FileNode {
        // Children are always pushed after their parent, so building in
        // reverse index order sees every child before its parent.
        let mut built: Vec<Option<FileNode>> = Vec::with_capacity(self.nodes.len());
        built.resize_with(self.nodes.len(), || None);

        for (id, node) in self.nodes.into_iter().enumerate().rev() {
            let children = node
                .children
                .iter()
                .filter_map(|&child| built[child].take())
                .collect();
            built[id] = Some(FileNode {
                name: node.name,
                path: node.path,
                kind: node.kind,
                children,
            });
        }

        let mut root = built
            .into_iter()
            .next()
            .flatten()
            .unwrap_or_else(|| FileNode::directory("", "."));
        root.sort_children();
        root
    }
}

/// Options for rendering the tree.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Show file sizes.
    pub show_size: bool,
    /// Show the coarse file type.
    pub show_file_type: bool,
}

impl RenderOptions {
    /// Create options with all metadata enabled.
    pub fn with_metadata() -> Self {
        Self {
            show_size: true,
            show_file_type: true,
        }
    }
}

/// Box-drawing characters for tree rendering.
const BRANCH: &str = "├── ";
const LAST_BRANCH: &str = "└── ";
const VERTICAL: &str = "│   ";
const SPACE: &str = "    ";

/// Render a file tree to a string with box-drawing characters.
///
/// # Examples
///
/// ```
/// use cartographer::tree::{FileNode, RenderOptions, render_tree};
///
/// let mut root = FileNode::directory("project", ".");
/// root.add_child(FileNode::file("main.rs", "main.rs", Some(".rs".into()), 1024));
/// root.sort_children();
///
/// let output = render_tree(&root, &RenderOptions::default());
/// assert_eq!(output, "project/\n└── main.rs\n");
/// ```
pub fn render_tree(root: &FileNode, options: &RenderOptions) -> String {
    // Pre-allocate for typical tree size
    let mut output = String::with_capacity(4096);
    render_node(&mut output, root, "", true, true, options);
    output
}

fn render_node(
    output: &mut String,
    node: &FileNode,
    prefix: &str,
    is_last: bool,
    is_root: bool,
    options: &RenderOptions,
) {
    let branch = if is_root {
        ""
    } else if is_last {
        LAST_BRANCH
    } else {
        BRANCH
    };

    output.push_str(prefix);
    output.push_str(branch);
    output.push_str(&node.name);

    if node.is_directory() {
        output.push('/');
    }

    if let NodeKind::File {
        size, file_type, ..
    } = &node.kind
    {
        let mut metadata = Vec::new();

        if options.show_file_type {
            metadata.push(file_type.clone());
        }

        if options.show_size {
            metadata.push(format_size(*size));
        }

        if !metadata.is_empty() {
            output.push_str(" [");
            output.push_str(&metadata.join(", "));
            output.push(']');
        }
    }

    output.push('\n');

    let child_count = node.children.len();
    for (i, child) in node.children.iter().enumerate() {
        let is_last_child = i == child_count - 1;

        let new_prefix = if is_root {
            String::new()
        } else {
            let continuation = if is_last { SPACE } else { VERTICAL };
            format!("{}{}", prefix, continuation)
        };

        render_node(output, child, &new_prefix, is_last_child, false, options);
    }
}

/// Format file size for display.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes < KB {
        format!("{}B", bytes)
    } else if bytes < MB {
        format!("{:.1}KB", bytes as f64 / KB as f64)
    } else {
        format!("{:.1}MB", bytes as f64 / MB as f64)
    }
}

/// Format number with thousands separators.
pub fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_node() {
        let node = FileNode::file("main.rs", "src/main.rs", Some(".rs".into()), 1024);
        assert!(node.is_file());
        assert_eq!(node.extension(), Some(".rs"));
        assert_eq!(node.size(), Some(1024));
        assert_eq!(node.file_type(), Some("Rust"));
    }

    #[test]
    fn test_sort_children_case_sensitive() {
        let mut dir = FileNode::directory("src", "src");
        dir.add_child(FileNode::file("b.rs", "src/b.rs", Some(".rs".into()), 1));
        dir.add_child(FileNode::directory("utils", "src/utils"));
        dir.add_child(FileNode::file("B.rs", "src/B.rs", Some(".rs".into()), 1));
        dir.add_child(FileNode::file("a.rs", "src/a.rs", Some(".rs".into()), 1));

        dir.sort_children();

        let names: Vec<&str> = dir.children().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["utils", "B.rs", "a.rs", "b.rs"]);
    }

    #[test]
    fn test_builder_creates_directories_lazily() {
        let mut builder = TreeBuilder::new("root");
        assert!(builder.is_empty());

        assert!(builder.insert_file("a/b/c.txt", 5));
        assert!(builder.insert_file("a/d.txt", 7));
        assert!(!builder.insert_file("a/d.txt", 7));
        assert_eq!(builder.len(), 5);

        let root = builder.build();
        assert_eq!(root.file_count(), 2);
        assert_eq!(root.directory_count(), 3);
        assert_eq!(root.total_size(), 12);

        let b = root.find("a/b").unwrap();
        assert!(b.is_directory());
        assert_eq!(b.children()[0].path, "a/b/c.txt");
    }

    #[test]
    fn test_builder_sorts_on_build() {
        let mut builder = TreeBuilder::new("root");
        builder.insert_file("z.rs", 1);
        builder.insert_file("lib/x.rs", 1);
        builder.insert_file("a.rs", 1);

        let root = builder.build();
        let names: Vec<&str> = root.children().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["lib", "a.rs", "z.rs"]);
    }

    #[test]
    fn test_preorder() {
        let mut builder = TreeBuilder::new("root");
        builder.insert_file("src/a.rs", 1);
        builder.insert_file("b.md", 1);
        let root = builder.build();

        let paths: Vec<&str> = root.iter().map(|n| n.path.as_str()).collect();
        assert_eq!(paths, vec![".", "src", "src/a.rs", "b.md"]);
    }

    #[test]
    fn test_json_shape() {
        let mut builder = TreeBuilder::new("root");
        builder.insert_file("src/a.ts", 200);
        let root = builder.build();

        let value = serde_json::to_value(&root).unwrap();
        assert_eq!(value["type"], "directory");
        let src = &value["children"][0];
        assert_eq!(src["type"], "directory");
        let file = &src["children"][0];
        assert_eq!(file["type"], "file");
        assert_eq!(file["size"], 200);
        assert_eq!(file["extension"], ".ts");
        assert_eq!(file["fileType"], "TypeScript");

        let back: FileNode = serde_json::from_value(value).unwrap();
        assert_eq!(back, root);
    }

    #[test]
    fn test_render_nested() {
        let mut builder = TreeBuilder::new("project");
        builder.insert_file("src/main.rs", 100);
        builder.insert_file("src/lib.rs", 200);
        builder.insert_file("Cargo.toml", 50);
        let root = builder.build();

        let output = render_tree(&root, &RenderOptions::default());
        let expected = "project/\n├── src/\n│   ├── lib.rs\n│   └── main.rs\n└── Cargo.toml\n";
        assert_eq!(output, expected);
    }

    #[test]
    fn test_render_with_metadata() {
        let mut root = FileNode::directory("project", ".");
        root.add_child(FileNode::file("main.rs", "main.rs", Some(".rs".into()), 2048));

        let output = render_tree(&root, &RenderOptions::with_metadata());
        assert!(output.contains("main.rs [Rust, 2.0KB]"));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0B");
        assert_eq!(format_size(512), "512B");
        assert_eq!(format_size(1024), "1.0KB");
        assert_eq!(format_size(1536), "1.5KB");
        assert_eq!(format_size(1024 * 1024), "1.0MB");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn test_file_type_label() {
        assert_eq!(file_type_label(Some(".ts")), "TypeScript");
        assert_eq!(file_type_label(Some(".md")), "Documentation");
        assert_eq!(file_type_label(Some(".weird")), "Other");
        assert_eq!(file_type_label(None), "Other");
    }
}
