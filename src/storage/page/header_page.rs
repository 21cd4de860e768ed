use crate::common::{PageId, PAGE_SIZE};

const RECORD_COUNT_OFFSET: usize = 0;
const RECORDS_OFFSET: usize = 4;

const NAME_SIZE: usize = 32;
const RECORD_SIZE: usize = NAME_SIZE + 4;

/// Maximum number of index records the header page can hold.
pub const MAX_HEADER_RECORDS: usize = (PAGE_SIZE - RECORDS_OFFSET) / RECORD_SIZE;

/// HeaderPage lives at the reserved page id 0 and maps index names to their
/// root page ids, persisting them across restarts. Each record is a fixed
/// 32-byte NUL-padded name followed by the root page id.
pub struct HeaderPage<'a> {
    data: &'a mut [u8],
}

impl<'a> HeaderPage<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    pub fn init(&mut self) {
        self.data.fill(0);
    }

    pub fn record_count(&self) -> usize {
        read_record_count(self.data)
    }

    /// Adds a record for a new index. Returns false when the page is full or
    /// the name is already present.
    pub fn insert_record(&mut self, name: &str, root_page_id: PageId) -> bool {
        let count = self.record_count();
        if count >= MAX_HEADER_RECORDS || find_record(self.data, name).is_some() {
            return false;
        }

        self.write_record(count, name, root_page_id);
        let bytes = ((count + 1) as u32).to_le_bytes();
        self.data[RECORD_COUNT_OFFSET..RECORD_COUNT_OFFSET + 4].copy_from_slice(&bytes);
        true
    }

    /// Overwrites the root page id of an existing record. Returns false when
    /// the name is unknown.
    pub fn update_record(&mut self, name: &str, root_page_id: PageId) -> bool {
        let Some(index) = find_record(self.data, name) else {
            return false;
        };
        self.write_record(index, name, root_page_id);
        true
    }

    pub fn get_root_id(&self, name: &str) -> Option<PageId> {
        find_record(self.data, name).map(|index| read_root_id(self.data, index))
    }

    fn write_record(&mut self, index: usize, name: &str, root_page_id: PageId) {
        assert!(name.len() <= NAME_SIZE, "index name too long");

        let offset = RECORDS_OFFSET + index * RECORD_SIZE;
        self.data[offset..offset + NAME_SIZE].fill(0);
        self.data[offset..offset + name.len()].copy_from_slice(name.as_bytes());
        let bytes = root_page_id.as_u32().to_le_bytes();
        self.data[offset + NAME_SIZE..offset + RECORD_SIZE].copy_from_slice(&bytes);
    }
}

/// Read-only view of the header page.
pub struct HeaderPageRef<'a> {
    data: &'a [u8],
}

impl<'a> HeaderPageRef<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    pub fn record_count(&self) -> usize {
        read_record_count(self.data)
    }

    pub fn get_root_id(&self, name: &str) -> Option<PageId> {
        find_record(self.data, name).map(|index| read_root_id(self.data, index))
    }
}

fn read_record_count(data: &[u8]) -> usize {
    let bytes: [u8; 4] = data[RECORD_COUNT_OFFSET..RECORD_COUNT_OFFSET + 4]
        .try_into()
        .unwrap();
    u32::from_le_bytes(bytes) as usize
}

fn find_record(data: &[u8], name: &str) -> Option<usize> {
    assert!(name.len() <= NAME_SIZE, "index name too long");

    let mut padded = [0u8; NAME_SIZE];
    padded[..name.len()].copy_from_slice(name.as_bytes());

    (0..read_record_count(data)).find(|&index| {
        let offset = RECORDS_OFFSET + index * RECORD_SIZE;
        data[offset..offset + NAME_SIZE] == padded
    })
}

fn read_root_id(data: &[u8], index: usize) -> PageId {
    let offset = RECORDS_OFFSET + index * RECORD_SIZE + NAME_SIZE;
    let bytes: [u8; 4] = data[offset..offset + 4].try_into().unwrap();
    PageId::new(u32::from_le_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_page_insert_and_get() {
        let mut data = [0u8; PAGE_SIZE];
        let mut page = HeaderPage::new(&mut data);
        page.init();

        assert!(page.insert_record("orders_pk", PageId::new(3)));
        assert!(page.insert_record("users_pk", PageId::new(9)));
        assert_eq!(page.record_count(), 2);

        assert_eq!(page.get_root_id("orders_pk"), Some(PageId::new(3)));
        assert_eq!(page.get_root_id("users_pk"), Some(PageId::new(9)));
        assert_eq!(page.get_root_id("missing"), None);

        let view = HeaderPageRef::new(&data);
        assert_eq!(view.get_root_id("orders_pk"), Some(PageId::new(3)));
    }

    #[test]
    fn test_header_page_duplicate_insert_rejected() {
        let mut data = [0u8; PAGE_SIZE];
        let mut page = HeaderPage::new(&mut data);
        page.init();

        assert!(page.insert_record("idx", PageId::new(1)));
        assert!(!page.insert_record("idx", PageId::new(2)));
        assert_eq!(page.get_root_id("idx"), Some(PageId::new(1)));
    }

    #[test]
    fn test_header_page_update() {
        let mut data = [0u8; PAGE_SIZE];
        let mut page = HeaderPage::new(&mut data);
        page.init();

        assert!(!page.update_record("idx", PageId::new(5)));
        assert!(page.insert_record("idx", PageId::new(5)));
        assert!(page.update_record("idx", PageId::new(8)));
        assert_eq!(page.get_root_id("idx"), Some(PageId::new(8)));
        assert_eq!(page.record_count(), 1);
    }

    #[test]
    fn test_header_page_full() {
        let mut data = [0u8; PAGE_SIZE];
        let mut page = HeaderPage::new(&mut data);
        page.init();

        for i in 0..MAX_HEADER_RECORDS {
            assert!(page.insert_record(&format!("index_{i}"), PageId::new(i as u32)));
        }
        assert!(!page.insert_record("one_too_many", PageId::new(0)));
    }
}
