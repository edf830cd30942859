use crate::common::{OleError, OleResult};
use crate::directory::{Entry, ObjectType, DIRECTORY_ENTRY_SIZE, MAX_REG_SID, NO_STREAM, ROOT_SID};
use fixedbitset::FixedBitSet;
use log::debug;
use std::collections::HashMap;

/// Stream id: index of a record in the directory stream.
pub type Sid = u32;

/// Children of a storage, in in-order sibling-tree order.
#[derive(Debug, Clone, Default)]
pub struct Children {
    pub order: Vec<Sid>,
    by_name: HashMap<String, Sid>,
}

impl Children {
    pub fn get(&self, name: &str) -> Option<Sid> {
        self.by_name.get(&fold_name(name)).copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Root or storage entry.
    Directory(Children),
    /// Stream or empty entry.
    File,
    /// Property storage; its bytes are left to a property-set decoder.
    PropertySet,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub sid: Sid,
    pub name: String,
    pub object_type: ObjectType,
    pub parent: Option<Sid>,
    pub kind: NodeKind,
    /// The size field of the record; storages report the sum of their children instead.
    pub declared_size: u64,
    pub entry: Entry,
}

impl Node {
    fn decode(stream: &[u8], sid: Sid, legacy_sector_size: bool) -> OleResult<Self> {
        let entry = Entry::from_stream(stream, sid)?;
        let object_type = entry.object_type().ok_or(OleError::InvalidEntryType {
            sid,
            tag: entry.object_type,
        })?;

        let is_root = object_type == ObjectType::RootStorage;
        if sid == ROOT_SID && !is_root {
            return Err(OleError::MissingRoot { tag: entry.object_type });
        }
        if sid != ROOT_SID && is_root {
            return Err(OleError::MisplacedRoot { sid });
        }

        let kind = match object_type {
            ObjectType::RootStorage | ObjectType::Storage => NodeKind::Directory(Children::default()),
            ObjectType::Stream | ObjectType::Empty => NodeKind::File,
            ObjectType::Property => NodeKind::PropertySet,
            ObjectType::LockBytes => {
                return Err(OleError::InvalidEntryType {
                    sid,
                    tag: entry.object_type,
                })
            }
        };

        Ok(Self {
            sid,
            name: entry.name(),
            object_type,
            parent: None,
            kind,
            declared_size: entry.size(legacy_sector_size),
            entry,
        })
    }

    pub fn is_root(&self) -> bool {
        self.object_type == ObjectType::RootStorage
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.kind, NodeKind::Directory(_))
    }

    pub fn children(&self) -> Option<&Children> {
        match &self.kind {
            NodeKind::Directory(children) => Some(children),
            _ => None,
        }
    }

    fn children_mut(&mut self) -> Option<&mut Children> {
        match &mut self.kind {
            NodeKind::Directory(children) => Some(children),
            _ => None,
        }
    }
}

/// Every directory entry reachable from the root, addressed by sid.
#[derive(Debug, Clone)]
pub struct DirectoryTree {
    root: Node,
    /// Slot 0 stays empty; the root lives in `root`.
    nodes: Vec<Option<Node>>,
}

impl DirectoryTree {
    /// Decodes the root and, storage by storage, the sibling tree under
    /// each `child` pointer.
    pub fn build(stream: &[u8], legacy_sector_size: bool) -> OleResult<Self> {
        let slots = stream.len() / DIRECTORY_ENTRY_SIZE;
        let root = Node::decode(stream, ROOT_SID, legacy_sector_size)?;
        let mut tree = Self {
            root,
            nodes: vec![None; slots],
        };
        let mut visited = FixedBitSet::with_capacity(slots);
        visited.insert(ROOT_SID as usize);

        let mut storages = vec![ROOT_SID];
        while let Some(parent) = storages.pop() {
            let child = tree.get(parent)?.entry.child_id;
            let mut pending = Vec::new();
            let mut next = tree.check_sid(child)?;

            // in-order walk: left subtree, the node itself, right subtree
            loop {
                while let Some(sid) = next {
                    if visited.put(sid as usize) {
                        return Err(OleError::DirectoryCycle { sid });
                    }
                    let mut node = Node::decode(stream, sid, legacy_sector_size)?;
                    node.parent = Some(parent);
                    next = tree.check_sid(node.entry.left_sibling_id)?;
                    tree.nodes[sid as usize] = Some(node);
                    pending.push(sid);
                }
                let Some(sid) = pending.pop() else {
                    break;
                };
                let node = tree.get(sid)?;
                let (is_directory, right) = (node.is_directory(), node.entry.right_sibling_id);
                tree.append_child(parent, sid)?;
                if is_directory {
                    storages.push(sid);
                }
                next = tree.check_sid(right)?;
            }
        }

        debug!("directory tree built: {} of {} entries in use", visited.count_ones(..), slots);
        Ok(tree)
    }

    /// `None` for NOSTREAM, an error for anything that is not a record index.
    fn check_sid(&self, sid: u32) -> OleResult<Option<Sid>> {
        if sid == NO_STREAM {
            return Ok(None);
        }
        if sid > MAX_REG_SID || sid as usize >= self.nodes.len() {
            return Err(OleError::InvalidSid { sid });
        }
        Ok(Some(sid))
    }

    fn append_child(&mut self, parent: Sid, sid: Sid) -> OleResult<()> {
        let name = self.get(sid)?.name.clone();
        let parent_node = self.slot_mut(parent).ok_or(OleError::InvalidSid { sid: parent })?;
        let parent_name = parent_node.name.clone();
        let children = parent_node
            .children_mut()
            .ok_or(OleError::NotAStorage { name: parent_name.clone() })?;
        if children.by_name.insert(fold_name(&name), sid).is_some() {
            return Err(OleError::DuplicateName {
                parent: parent_name,
                name,
            });
        }
        children.order.push(sid);
        Ok(())
    }

    fn slot(&self, sid: Sid) -> Option<&Node> {
        if sid == ROOT_SID {
            return Some(&self.root);
        }
        self.nodes.get(sid as usize)?.as_ref()
    }

    fn slot_mut(&mut self, sid: Sid) -> Option<&mut Node> {
        if sid == ROOT_SID {
            return Some(&mut self.root);
        }
        self.nodes.get_mut(sid as usize)?.as_mut()
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// The node of `sid`, if it is reachable from the root.
    pub fn get(&self, sid: Sid) -> OleResult<&Node> {
        self.slot(sid).ok_or(OleError::InvalidSid { sid })
    }

    /// Number of record slots in the directory stream.
    pub fn slots(&self) -> usize {
        self.nodes.len()
    }

    /// Number of materialized nodes, root included.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        1 + self.nodes.iter().flatten().count()
    }

    pub fn children<'a>(&'a self, node: &'a Node) -> impl Iterator<Item = &'a Node> + 'a {
        node.children()
            .into_iter()
            .flat_map(|children| children.order.iter())
            .filter_map(move |sid| self.slot(*sid))
    }

    /// Case-insensitive child lookup.
    pub fn child(&self, node: &Node, name: &str) -> OleResult<&Node> {
        let children = node
            .children()
            .ok_or_else(|| OleError::NotAStorage { name: node.name.clone() })?;
        let sid = children
            .get(name)
            .ok_or_else(|| OleError::NotFound { name: name.to_string() })?;
        self.get(sid)
    }

    /// Walks `/`-separated segments from the root; every segment, empty ones
    /// included, must name a child.
    pub fn find(&self, path: &str) -> OleResult<&Node> {
        path.split('/')
            .try_fold(self.root(), |dir, segment| self.child(dir, segment))
    }

    pub fn parent(&self, node: &Node) -> Option<&Node> {
        node.parent.and_then(|sid| self.slot(sid))
    }

    /// Path from the root, `/`-separated; the root itself is "".
    pub fn path(&self, node: &Node) -> String {
        let mut names = Vec::new();
        let mut current = node;
        while let Some(parent) = self.parent(current) {
            names.push(current.name.as_str());
            current = parent;
        }
        names.reverse();
        names.join("/")
    }

    /// The root reports its own size field (the mini stream length); other
    /// storages sum their descendants' streams; everything else its size field.
    pub fn size(&self, node: &Node) -> u64 {
        if node.is_root() || !node.is_directory() {
            return node.declared_size;
        }
        let mut total = 0u64;
        let mut stack: Vec<&Node> = self.children(node).collect();
        while let Some(current) = stack.pop() {
            if current.is_directory() {
                stack.extend(self.children(current));
            } else {
                total = total.saturating_add(current.declared_size);
            }
        }
        total
    }

    /// Depth-first walk in child order, root first.
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            tree: self,
            stack: vec![self.root()],
        }
    }
}

pub struct Walk<'a> {
    tree: &'a DirectoryTree,
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        let before = self.stack.len();
        self.stack.extend(self.tree.children(node));
        self.stack[before..].reverse();
        Some(node)
    }
}

fn fold_name(name: &str) -> String {
    name.to_lowercase()
}
