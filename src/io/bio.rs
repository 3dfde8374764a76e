//! Buffer cache.
//!
//! The buffer cache is a fixed pool of buffers holding cached copies
//! of disk block contents. Caching disk blocks in memory reduces the
//! number of disk reads and also provides a synchronization point for
//! disk blocks used by multiple processes.
//!
//! The pool is sharded into buckets by block number. A bucket's spin
//! lock covers which buffers it holds and their reference counts; each
//! buffer's sleep-lock covers its data. Bucket locks are never held
//! while sleeping on a buffer or doing disk I/O, and never two at once.
//!
//! Interface:
//! - To get a buffer for a particular disk block, call bread.
//! - After changing buffer data, call bwrite to write it to disk.
//! - When done with the buffer, call brelse (or drop it).
//! - Only one process at a time can use a buffer,
//!   so do not keep them longer than necessary.

use super::{
    bucket::{bucket_of, Bucket, Entry},
    buf::{Buf, Buffer, Pin},
    error::BioError,
};
use crate::{
    fs::{BlockNo, DeviceId},
    hal::{clock::Clock, hardware::Disk},
    param::{NBUCKET, NBUF},
    proc::scheduler::Scheduler,
    sync::spinmutex::SpinMutex,
};
use core::{
    ptr,
    sync::atomic::{AtomicUsize, Ordering},
};
use log::{debug, error, info, trace, warn};

/// Counters of cache activity since construction.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct BioStats {
    /// Lookups that found the block resident.
    pub hits: usize,
    /// Lookups that had to bind a buffer to the block.
    pub misses: usize,
    /// Misses served by taking a buffer from another bucket.
    pub steals: usize,
    /// Blocks read from disk.
    pub reads: usize,
    /// Blocks written to disk.
    pub writes: usize,
}

#[derive(Default)]
struct Counters {
    hits: AtomicUsize,
    misses: AtomicUsize,
    steals: AtomicUsize,
    reads: AtomicUsize,
    writes: AtomicUsize,
}
impl Counters {
    fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }
    fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }
    fn steal(&self) {
        self.steals.fetch_add(1, Ordering::Relaxed);
    }
    fn read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }
    fn write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }
    fn snapshot(&self) -> BioStats {
        BioStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            steals: self.steals.load(Ordering::Relaxed),
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
        }
    }
}

/// Outcome of moving a victim buffer into a block's home bucket.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Steal {
    /// The victim was no longer free in its bucket.
    Lost,
    /// The block became resident meanwhile. Holds the resident buffer,
    /// already referenced; the victim was parked unbound.
    Resident(usize),
    /// The victim is now bound to the block.
    Moved(usize),
}

pub struct BufferCache<D: Disk, C: Clock, S: Scheduler> {
    disk: D,
    clock: C,
    scheduler: S,
    buffers: [Buffer; NBUF],
    buckets: [SpinMutex<Bucket>; NBUCKET],
    counters: Counters,
}
impl<D: Disk, C: Clock, S: Scheduler> BufferCache<D, C, S> {
    /// Build the pool, dealing the buffers out to the buckets in turn.
    pub fn new(disk: D, clock: C, scheduler: S) -> BufferCache<D, C, S> {
        let mut buckets: [Bucket; NBUCKET] = core::array::from_fn(|_| Bucket::new());
        for id in 0..NBUF {
            buckets[id % NBUCKET].insert(Entry::new(id));
        }
        info!("binit: {} buffers in {} buckets", NBUF, NBUCKET);

        BufferCache {
            disk,
            clock,
            scheduler,
            buffers: core::array::from_fn(|_| Buffer::new()),
            buckets: buckets.map(SpinMutex::new),
            counters: Counters::default(),
        }
    }
    pub fn disk(&self) -> &D {
        &self.disk
    }
    pub fn clock(&self) -> &C {
        &self.clock
    }
    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }
    pub fn stats(&self) -> BioStats {
        self.counters.snapshot()
    }
    pub(crate) fn buffer(&self, id: usize) -> &Buffer {
        &self.buffers[id]
    }

    /// Look through the buffer cache for block on device dev.
    ///
    /// If not found, allocate a buffer, taking the least recently
    /// used free one from another bucket when this block's bucket
    /// has none. In either case, return locked buffer.
    fn bget(&self, dev: DeviceId, blockno: BlockNo) -> Result<Buf<'_, D, C, S>, BioError> {
        let home = bucket_of(blockno);

        loop {
            let mut bucket = self.buckets[home].lock();

            // Is the block already cached?
            if let Some(entry) = bucket.lookup(dev, blockno) {
                entry.refcnt += 1;
                let id = entry.id;
                drop(bucket);
                self.counters.hit();
                trace!("bget: hit {}/{} in buffer {}", dev, blockno, id);
                return Ok(self.lock_buffer(id, dev, blockno));
            }

            // Not cached. Recycle a free buffer from this bucket.
            if let Some(entry) = bucket.find_free() {
                entry.bind(dev, blockno);
                let id = entry.id;
                self.buffers[id].set_valid(false);
                drop(bucket);
                self.counters.miss();
                trace!("bget: bound {}/{} to buffer {}", dev, blockno, id);
                return Ok(self.lock_buffer(id, dev, blockno));
            }
            drop(bucket);

            // This bucket is full of held buffers. Steal one.
            let Some((source, id)) = self.find_victim(home) else {
                error!("bget: every buffer is held, cannot cache {}/{}", dev, blockno);
                return Err(BioError::ResourceExhausted { dev, blockno });
            };

            match self.steal(home, source, id, dev, blockno) {
                Steal::Lost => {
                    warn!("bget: buffer {} in bucket {} was claimed, rescanning", id, source);
                    continue;
                }
                Steal::Resident(resident) => {
                    self.counters.hit();
                    return Ok(self.lock_buffer(resident, dev, blockno));
                }
                Steal::Moved(id) => {
                    self.counters.miss();
                    self.counters.steal();
                    debug!(
                        "bget: moved buffer {} from bucket {} to {} for {}/{}",
                        id, source, home, dev, blockno
                    );
                    return Ok(self.lock_buffer(id, dev, blockno));
                }
            }
        }
    }

    /// Move free buffer `id` from bucket `source` to `home` and bind it
    /// to the block, unless it was claimed or the block was cached since
    /// the scan.
    fn steal(&self, home: usize, source: usize, id: usize, dev: DeviceId, blockno: BlockNo) -> Steal {
        // The scan let go of the source bucket, so check again under
        // its lock.
        let taken = self.buckets[source].lock().take_free(id);
        let Some(mut entry) = taken else {
            return Steal::Lost;
        };

        let mut bucket = self.buckets[home].lock();

        if let Some(resident) = bucket.lookup(dev, blockno) {
            resident.refcnt += 1;
            let resident = resident.id;
            entry.unbind();
            bucket.insert(entry);
            return Steal::Resident(resident);
        }

        entry.bind(dev, blockno);
        self.buffers[id].set_valid(false);
        bucket.insert(entry);
        Steal::Moved(id)
    }

    /// Scan every bucket but `home`, one at a time, for the free buffer
    /// used least recently. Returns its bucket and id.
    fn find_victim(&self, home: usize) -> Option<(usize, usize)> {
        let mut victim: Option<(usize, usize, usize)> = None;

        for (index, bucket) in self.buckets.iter().enumerate() {
            if index == home {
                continue;
            }
            let bucket = bucket.lock();
            if let Some((id, tick)) = bucket.lru_free(|id| self.buffers[id].last_access()) {
                if victim.map_or(true, |(_, _, oldest)| tick < oldest) {
                    victim = Some((index, id, tick));
                }
            }
        }

        victim.map(|(index, id, _)| (index, id))
    }

    fn lock_buffer(&self, id: usize, dev: DeviceId, blockno: BlockNo) -> Buf<'_, D, C, S> {
        self.buffers[id].lock.lock_unguarded(&self.scheduler);
        Buf {
            cache: self,
            id,
            dev,
            blockno,
        }
    }

    /// Return a locked buf with the contents of the indicated block.
    pub fn try_bread(&self, dev: DeviceId, blockno: BlockNo) -> Result<Buf<'_, D, C, S>, BioError> {
        let mut buf = self.bget(dev, blockno)?;
        let buffer = &self.buffers[buf.id];

        if !buffer.is_valid() {
            self.disk.read(dev, blockno, &mut buf);
            buffer.set_valid(true);
            self.counters.read();
        }
        buffer.touch(self.clock.ticks());

        Ok(buf)
    }
    /// Like `try_bread`, but running out of buffers is fatal.
    pub fn bread(&self, dev: DeviceId, blockno: BlockNo) -> Buf<'_, D, C, S> {
        match self.try_bread(dev, blockno) {
            Ok(buf) => buf,
            Err(err) => panic!("{}", err),
        }
    }

    /// Write buf's contents to disk. Must be locked by the caller.
    pub fn try_bwrite(&self, buf: &Buf<'_, D, C, S>) -> Result<(), BioError> {
        assert!(ptr::eq(self, buf.cache), "bwrite: buffer from another cache");
        let buffer = &self.buffers[buf.id];

        if !buffer.lock.holding(&self.scheduler) {
            return Err(BioError::LockMisuse { op: "bwrite" });
        }
        self.disk.write(buf.dev, buf.blockno, buf);
        buffer.touch(self.clock.ticks());
        self.counters.write();

        Ok(())
    }
    /// Like `try_bwrite`, but writing an unlocked buffer is fatal.
    pub fn bwrite(&self, buf: &Buf<'_, D, C, S>) {
        if let Err(err) = self.try_bwrite(buf) {
            panic!("{}", err);
        }
    }

    /// Release a locked buffer.
    ///
    /// The bucket keeps its order; recency lives in the buffer's tick.
    pub fn brelse(&self, buf: Buf<'_, D, C, S>) {
        assert!(ptr::eq(self, buf.cache), "brelse: buffer from another cache");
        drop(buf);
    }
    pub(crate) fn release(&self, buf: &Buf<'_, D, C, S>) {
        let buffer = &self.buffers[buf.id];
        if !buffer.lock.holding(&self.scheduler) {
            panic!("{}", BioError::LockMisuse { op: "brelse" });
        }
        unsafe { buffer.lock.unlock(&self.scheduler) };

        let mut bucket = self.buckets[bucket_of(buf.blockno)].lock();
        match bucket.get_mut(buf.id) {
            Some(entry) => entry.refcnt -= 1,
            None => panic!("brelse: buffer {} missing from bucket", buf.id),
        }
    }

    /// Keep buf's buffer bound to its block after it is released,
    /// until the matching `bunpin`.
    pub fn bpin(&self, buf: &Buf<'_, D, C, S>) {
        let mut bucket = self.buckets[bucket_of(buf.blockno)].lock();
        match bucket.get_mut(buf.id) {
            Some(entry) => entry.refcnt += 1,
            None => panic!("bpin: buffer {} missing from bucket", buf.id),
        }
    }
    pub fn bunpin(&self, buf: &Buf<'_, D, C, S>) {
        let mut bucket = self.buckets[bucket_of(buf.blockno)].lock();
        match bucket.get_mut(buf.id) {
            // The caller's own hold accounts for one reference.
            Some(entry) if entry.refcnt > 1 => entry.refcnt -= 1,
            Some(_) => panic!("bunpin: buffer {} is not pinned", buf.id),
            None => panic!("bunpin: buffer {} missing from bucket", buf.id),
        }
    }

    /// Pin a resident block without taking its content lock, whether
    /// or not anyone holds it. Returns `None` if the block is not cached.
    pub fn pin(&self, dev: DeviceId, blockno: BlockNo) -> Option<Pin> {
        let mut bucket = self.buckets[bucket_of(blockno)].lock();
        let entry = bucket.lookup(dev, blockno)?;
        entry.refcnt += 1;
        Some(Pin {
            id: entry.id,
            dev,
            blockno,
        })
    }
    /// Drop a pin taken with `pin`.
    pub fn unpin(&self, pin: Pin) {
        let mut bucket = self.buckets[bucket_of(pin.blockno)].lock();
        match bucket.get_mut(pin.id) {
            // A pinned entry cannot be rebound or moved.
            Some(entry) if entry.holds(pin.dev, pin.blockno) && entry.refcnt > 0 => {
                entry.refcnt -= 1
            }
            _ => panic!("unpin: buffer {} is not pinned to {}/{}", pin.id, pin.dev, pin.blockno),
        }
    }

    /// Reference count of the buffer caching block `blockno` on `dev`,
    /// or `None` if the block is not resident.
    pub fn holds(&self, dev: DeviceId, blockno: BlockNo) -> Option<u32> {
        let bucket = self.buckets[bucket_of(blockno)].lock();
        bucket.find(dev, blockno).map(|entry| entry.refcnt)
    }
    /// Number of buffers currently in bucket `index`.
    pub fn bucket_len(&self, index: usize) -> usize {
        self.buckets[index].lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fs::BSIZE,
        hal::{clock::Ticks, hardware::ramdisk::Ramdisk, platform::ThreadScheduler},
    };

    type Cache<'a> = BufferCache<&'a Ramdisk, &'a Ticks, ThreadScheduler>;

    fn cache<'a>(disk: &'a Ramdisk, clock: &'a Ticks) -> Cache<'a> {
        BufferCache::new(disk, clock, ThreadScheduler)
    }

    #[test]
    fn binit_deals_buffers_round_robin() {
        let (disk, clock) = (Ramdisk::new(), Ticks::new());
        let cache = cache(&disk, &clock);

        let lens: [usize; NBUCKET] = core::array::from_fn(|i| cache.bucket_len(i));
        assert_eq!(lens.iter().sum::<usize>(), NBUF);
        let (min, max) = (lens.iter().min().unwrap(), lens.iter().max().unwrap());
        assert!(max - min <= 1);
        assert_eq!(cache.stats(), BioStats::default());
    }

    #[test]
    fn bget_does_not_touch_the_tick() {
        let (disk, clock) = (Ramdisk::new(), Ticks::new());
        let cache = cache(&disk, &clock);
        clock.clockintr();

        let buf = cache.bget(1, 4).unwrap();
        assert_eq!(buf.last_access(), 0);
        assert!(!buf.is_valid());
        drop(buf);

        let buf = cache.bread(1, 4);
        assert_eq!(buf.last_access(), 1);
        assert!(buf.is_valid());
    }

    #[test]
    fn local_free_buffer_beats_an_older_remote_one() {
        let (disk, clock) = (Ramdisk::new(), Ticks::new());
        let cache = cache(&disk, &clock);

        // A free buffer in bucket 2, last used at tick 0.
        cache.brelse(cache.bread(1, 2));
        for _ in 0..5 {
            clock.clockintr();
        }

        // Hold all but one buffer of bucket 1; the last one is free
        // but newer than the buffer in bucket 2.
        let home = bucket_of(1);
        let len = cache.bucket_len(home);
        let block = |i: usize| (home + i * NBUCKET) as BlockNo;
        let held: Vec<_> = (0..len - 1).map(|i| cache.bread(1, block(i))).collect();
        let last = cache.bread(1, block(len - 1));
        let last_id = last.id();
        cache.brelse(last);

        let next = cache.bread(1, block(len));
        assert_eq!(next.id(), last_id);
        assert_eq!(cache.stats().steals, 0);
        assert_eq!(cache.holds(1, 2), Some(0));
        assert_eq!(cache.holds(1, block(len - 1)), None);
        drop(held);
    }

    #[test]
    fn exhaustion_is_reported() {
        let (disk, clock) = (Ramdisk::new(), Ticks::new());
        let cache = cache(&disk, &clock);

        let held: Vec<_> = (0..NBUF as BlockNo).map(|b| cache.bread(1, b)).collect();
        assert_eq!(
            cache.try_bread(1, NBUF as BlockNo).unwrap_err(),
            BioError::ResourceExhausted {
                dev: 1,
                blockno: NBUF as BlockNo
            }
        );
        drop(held);
        assert!(cache.try_bread(1, NBUF as BlockNo).is_ok());
    }

    #[test]
    fn data_round_trips_through_the_disk() {
        let (disk, clock) = (Ramdisk::new(), Ticks::new());
        let cache = cache(&disk, &clock);

        let mut buf = cache.bread(3, 30);
        buf.fill(0xab);
        cache.bwrite(&buf);
        cache.brelse(buf);

        assert_eq!(disk.peek(3, 30), [0xab; BSIZE]);
        assert_eq!(cache.stats().writes, 1);
    }

    #[test]
    fn steal_loses_a_victim_claimed_after_the_scan() {
        let (disk, clock) = (Ramdisk::new(), Ticks::new());
        let cache = cache(&disk, &clock);
        let lens: [usize; NBUCKET] = core::array::from_fn(|i| cache.bucket_len(i));

        let (source, id) = cache.find_victim(0).unwrap();
        // All ticks are zero, so the victim is the first buffer of its
        // bucket, which is also the one a local miss there binds.
        let claimed = cache.bread(1, source as BlockNo);
        assert_eq!(claimed.id(), id);

        assert_eq!(cache.steal(0, source, id, 1, 0), Steal::Lost);
        assert_eq!(cache.holds(1, 0), None);
        assert_eq!(cache.holds(1, source as BlockNo), Some(1));
        let after: [usize; NBUCKET] = core::array::from_fn(|i| cache.bucket_len(i));
        assert_eq!(after, lens);

        // The next scan skips the claimed buffer.
        let (_, next) = cache.find_victim(0).unwrap();
        assert_ne!(next, id);
    }

    #[test]
    fn steal_parks_the_victim_when_the_block_became_resident() {
        let (disk, clock) = (Ramdisk::new(), Ticks::new());
        let cache = cache(&disk, &clock);
        let lens: [usize; NBUCKET] = core::array::from_fn(|i| cache.bucket_len(i));

        let (source, id) = cache.find_victim(0).unwrap();
        let resident = cache.bread(1, 0);
        let resident_id = resident.id();
        assert_ne!(resident_id, id);

        assert_eq!(cache.steal(0, source, id, 1, 0), Steal::Resident(resident_id));
        assert_eq!(cache.holds(1, 0), Some(2));
        assert_eq!(cache.bucket_len(0), lens[0] + 1);
        assert_eq!(cache.bucket_len(source), lens[source] - 1);
        assert_eq!((0..NBUCKET).map(|b| cache.bucket_len(b)).sum::<usize>(), NBUF);

        let parked = *cache.buckets[0].lock().get_mut(id).unwrap();
        assert_eq!(parked.key, None);
        assert_eq!(parked.refcnt, 0);

        // Hand back the reference the steal took on the resident buffer.
        drop(resident);
        drop(cache.lock_buffer(resident_id, 1, 0));
        assert_eq!(cache.holds(1, 0), Some(0));
        assert_eq!(cache.stats().reads, 1);
    }

    #[test]
    fn steal_binds_the_victim_in_its_new_bucket() {
        let (disk, clock) = (Ramdisk::new(), Ticks::new());
        let cache = cache(&disk, &clock);

        let (source, id) = cache.find_victim(0).unwrap();
        assert_ne!(source, 0);
        assert_eq!(cache.steal(0, source, id, 1, 0), Steal::Moved(id));
        assert_eq!(cache.holds(1, 0), Some(1));
        assert!(cache.buckets[0].lock().contains(id));
        assert!(!cache.buckets[source].lock().contains(id));
        assert!(!cache.buffer(id).is_valid());

        drop(cache.lock_buffer(id, 1, 0));
        assert_eq!(cache.holds(1, 0), Some(0));
    }

    #[test]
    fn pin_needs_a_resident_block() {
        let (disk, clock) = (Ramdisk::new(), Ticks::new());
        let cache = cache(&disk, &clock);

        assert_eq!(cache.pin(1, 8), None);
        cache.brelse(cache.bread(1, 8));
        let pin = cache.pin(1, 8).unwrap();
        assert_eq!((pin.dev(), pin.blockno()), (1, 8));
        assert_eq!(cache.holds(1, 8), Some(1));
        cache.unpin(pin);
        assert_eq!(cache.holds(1, 8), Some(0));
    }
}
