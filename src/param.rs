/// Max num of blocks any FS op writes
pub const MAXOPBLOCKS: usize = 10;
/// Size of disk block cache
pub const NBUF: usize = MAXOPBLOCKS * 3;
/// Number of buckets the block cache is sharded into
pub const NBUCKET: usize = 13;

const _: () = assert!(NBUCKET > 0);
const _: () = assert!(NBUF >= NBUCKET);
