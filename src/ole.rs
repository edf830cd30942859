use crate::chain::ChainReader;
use crate::common::{OleError, OleResult, SectorType};
use crate::directory::{Clsid, Color, ObjectType};
use crate::fat::Fat;
use crate::header::Header;
use crate::mini_fat::MiniStream;
use crate::tree::{DirectoryTree, Node, NodeKind, Sid};
use chrono::{DateTime, Utc};
use log::debug;
use once_cell::sync::OnceCell;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io::Read;
use std::path::Path;

/// A compound file opened over an in-memory buffer.
///
/// Header, FAT and the whole directory tree are decoded when the file is
/// opened. The mini stream and stream contents are materialized on first
/// use and kept for the lifetime of the value.
#[derive(Debug)]
pub struct Ole {
    data: Vec<u8>,
    header: Header,
    fat: Fat,
    directory: DirectoryTree,
    mini_stream: OnceCell<MiniStream>,
    contents: Vec<OnceCell<Vec<u8>>>,
}

impl Ole {
    pub fn from_path(path: impl AsRef<Path>) -> OleResult<Self> {
        let buf = fs::read(path)?;
        Self::from_bytes(buf)
    }

    pub fn from_reader<R: Read>(mut reader: R) -> OleResult<Self> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        Self::from_bytes(buf)
    }

    pub fn from_bytes(data: impl Into<Vec<u8>>) -> OleResult<Self> {
        let data = data.into();
        let header = Header::parse(&data)?;
        let fat = Fat::build(&data, &header)?;

        let stream = main_chain(&data, &header, &fat).read(header.first_directory_sector_location, None)?;
        debug!("directory stream loaded: {} bytes", stream.len());
        let directory = DirectoryTree::build(&stream, header.is_legacy_sector_size())?;

        let contents = (0..directory.slots()).map(|_| OnceCell::new()).collect();
        Ok(Self {
            data,
            header,
            fat,
            directory,
            mini_stream: OnceCell::new(),
            contents,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn fat(&self) -> &Fat {
        &self.fat
    }

    pub fn directory(&self) -> &DirectoryTree {
        &self.directory
    }

    pub fn root(&self) -> EntryRef<'_> {
        self.wrap(self.directory.root())
    }

    /// Looks up a `/`-separated path, case-insensitively, from the root.
    pub fn get_file(&self, path: &str) -> OleResult<EntryRef<'_>> {
        Ok(self.wrap(self.directory.find(path)?))
    }

    /// The node decoded for `sid`; only entries reachable from the root exist.
    pub fn entry(&self, sid: Sid) -> OleResult<EntryRef<'_>> {
        Ok(self.wrap(self.directory.get(sid)?))
    }

    /// Contents of the stream at `path`.
    pub fn open_stream(&self, path: &str) -> OleResult<&[u8]> {
        self.get_file(path)?.contents()
    }

    /// Every node, root first, depth-first in child order.
    pub fn walk(&self) -> impl Iterator<Item = EntryRef<'_>> + '_ {
        self.directory.walk().map(move |node| self.wrap(node))
    }

    /// Reads a chain starting at `start`.
    ///
    /// Streams with a declared size below the cutoff are read from the mini
    /// stream unless `force_main_fat` is set; everything else, including reads
    /// of unknown size, goes through the main FAT.
    pub fn read_stream(&self, start: SectorType, size: Option<u64>, force_main_fat: bool) -> OleResult<Vec<u8>> {
        match size {
            Some(size) if size < self.header.mini_stream_cutoff_size as u64 && !force_main_fat => {
                let mini = self.mini_stream()?;
                mini.reader(self.header.mini_sector_size()).read(start, Some(size))
            }
            _ => self.main_chain().read(start, size),
        }
    }

    fn main_chain(&self) -> ChainReader<'_> {
        main_chain(&self.data, &self.header, &self.fat)
    }

    fn mini_stream(&self) -> OleResult<&MiniStream> {
        self.mini_stream.get_or_try_init(|| {
            let root = self.directory.root();
            MiniStream::load(
                &self.main_chain(),
                &self.header,
                root.entry.starting_sector_location,
                root.declared_size,
            )
        })
    }

    fn contents_of(&self, node: &Node) -> OleResult<&[u8]> {
        if node.is_directory() {
            return Err(OleError::NotAStream { name: node.name.clone() });
        }
        let cell = self
            .contents
            .get(node.sid as usize)
            .ok_or(OleError::InvalidSid { sid: node.sid })?;
        let data = cell.get_or_try_init(|| {
            self.read_stream(node.entry.starting_sector_location, Some(node.declared_size), false)
        })?;
        Ok(data.as_slice())
    }

    fn wrap<'a>(&'a self, node: &'a Node) -> EntryRef<'a> {
        EntryRef { ole: self, node }
    }
}

fn main_chain<'a>(data: &'a [u8], header: &Header, fat: &'a Fat) -> ChainReader<'a> {
    // sector 0 starts right after the header sector
    ChainReader::new(data, &fat.entries, header.sector_size(), header.sector_size())
        .with_incomplete_table(fat.incomplete)
}

impl Display for Ole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.header)?;
        for entry in self.walk() {
            writeln!(f, "{}", entry)?;
        }
        Ok(())
    }
}

/// A directory node together with the file it belongs to.
#[derive(Debug, Clone, Copy)]
pub struct EntryRef<'a> {
    ole: &'a Ole,
    node: &'a Node,
}

impl<'a> EntryRef<'a> {
    pub fn node(&self) -> &'a Node {
        self.node
    }

    pub fn sid(&self) -> Sid {
        self.node.sid
    }

    pub fn name(&self) -> &'a str {
        &self.node.name
    }

    pub fn object_type(&self) -> ObjectType {
        self.node.object_type
    }

    pub fn is_root(&self) -> bool {
        self.node.is_root()
    }

    pub fn is_directory(&self) -> bool {
        self.node.is_directory()
    }

    pub fn is_property_set(&self) -> bool {
        matches!(self.node.kind, NodeKind::PropertySet)
    }

    /// Whether the contents live in the mini stream.
    pub fn is_mini(&self) -> bool {
        !self.is_directory()
            && self.node.declared_size > 0
            && self.node.declared_size < self.ole.header.mini_stream_cutoff_size as u64
    }

    /// Stream length; for storages the sum of their descendants.
    pub fn size(&self) -> u64 {
        self.ole.directory.size(self.node)
    }

    pub fn first_sector(&self) -> SectorType {
        self.node.entry.starting_sector_location
    }

    pub fn clsid(&self) -> Clsid {
        self.node.entry.clsid
    }

    pub fn state_bits(&self) -> u32 {
        self.node.entry.state_bits
    }

    pub fn color(&self) -> Color {
        self.node.entry.color()
    }

    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.node.entry.created()
    }

    pub fn modified(&self) -> Option<DateTime<Utc>> {
        self.node.entry.modified()
    }

    pub fn parent(&self) -> Option<EntryRef<'a>> {
        self.ole.directory.parent(self.node).map(|node| self.ole.wrap(node))
    }

    pub fn path(&self) -> String {
        self.ole.directory.path(self.node)
    }

    pub fn children(&self) -> impl Iterator<Item = EntryRef<'a>> + 'a {
        let ole = self.ole;
        ole.directory.children(self.node).map(move |node| ole.wrap(node))
    }

    pub fn child(&self, name: &str) -> OleResult<EntryRef<'a>> {
        Ok(self.ole.wrap(self.ole.directory.child(self.node, name)?))
    }

    /// The stream bytes, read on first call and cached.
    pub fn contents(&self) -> OleResult<&'a [u8]> {
        self.ole.contents_of(self.node)
    }
}

impl Display for EntryRef<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let path = if self.is_root() { self.name().to_string() } else { self.path() };
        write!(f, "{}\t{}\t{}", path, self.object_type(), self.size())?;
        if !self.clsid().is_null() {
            write!(f, "\t{}", self.clsid())?;
        }
        Ok(())
    }
}
