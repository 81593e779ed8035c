use std::collections::BTreeMap;
use std::path::Path;

/// Mapping of the tracee's address space.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemoryRegion {
    /// Start address.
    pub address: u64,

    /// Offset within the backing file.
    pub offset: u64,

    /// Backing file, or pseudo-path such as `[stack]`. Empty if anonymous.
    pub file: String,

    /// Size in bytes.
    pub size: u64,

    /// Permissions, e.g. `r-xp`.
    pub permissions: String,
}

impl MemoryRegion {
    /// Address right after the region.
    pub const fn end(&self) -> u64 {
        self.address.saturating_add(self.size)
    }

    /// Returns whether `addr` lies within the region.
    pub const fn contains(&self, addr: u64) -> bool {
        self.address <= addr && addr < self.end()
    }

    /// Returns whether the region holds executable code.
    pub fn is_executable(&self) -> bool {
        self.permissions.as_bytes().get(2) == Some(&b'x')
    }
}

/// Snapshot of the memory regions of a process, keyed by start address.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryMap(BTreeMap<u64, MemoryRegion>);

impl MemoryMap {
    /// Reads the memory map of process `pid` from `/proc/<pid>/maps`.
    pub fn from_pid(pid: u64) -> crate::sys::Result<Self> {
        let path = format!("/proc/{pid}/maps");

        let text = std::fs::read_to_string(&path)
            .map_err(|e| crate::sys::Error::File(path.into(), e))?;

        Self::parse(&text)
    }

    /// Parses a listing in the format of `/proc/<pid>/maps`.
    pub fn parse(text: &str) -> crate::sys::Result<Self> {
        text.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                parse_region(line)
                    .map(|region| (region.address, region))
                    .ok_or_else(|| crate::sys::Error::MalformedMapsLine(line.to_owned()))
            })
            .collect::<Result<_, _>>()
            .map(Self)
    }

    /// Number of regions.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether the map holds no region.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the regions, lowest address first.
    pub fn regions(&self) -> impl Iterator<Item = &MemoryRegion> {
        self.0.values()
    }

    /// Returns the region containing `addr`.
    pub fn find_address(&self, addr: u64) -> Option<&MemoryRegion> {
        self.0
            .range(..=addr)
            .next_back()
            .map(|(_, region)| region)
            .filter(|region| region.contains(addr))
    }

    /// Returns the region mapping the start (file offset 0) of the file at
    /// `path`, i.e. where it was loaded.
    pub fn base_region_of(&self, path: &Path) -> Option<&MemoryRegion> {
        self.regions().find(|region| {
            region.offset == 0 && !region.file.is_empty() && Path::new(&region.file) == path
        })
    }

    /// Returns the executable region of the file at `path`.
    pub fn text_region_of(&self, path: &Path) -> Option<&MemoryRegion> {
        self.regions().find(|region| {
            region.is_executable() && !region.file.is_empty() && Path::new(&region.file) == path
        })
    }
}

/// Parses `start-end perms offset dev inode [path]`.
fn parse_region(line: &str) -> Option<MemoryRegion> {
    let mut rest = line;
    let mut fields = [""; 5];

    for field in &mut fields {
        rest = rest.trim_start();
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        (*field, rest) = rest.split_at(end);
    }

    let [range, permissions, offset, _dev, _inode] = fields;

    let (start, end) = range.split_once('-')?;
    let start = u64::from_str_radix(start, 16).ok()?;
    let end = u64::from_str_radix(end, 16).ok()?;
    let offset = u64::from_str_radix(offset, 16).ok()?;

    if permissions.len() != 4 || end < start {
        return None;
    }

    Some(MemoryRegion {
        address: start,
        offset,
        file: rest.trim().to_owned(),
        size: end - start,
        permissions: permissions.to_owned(),
    })
}
