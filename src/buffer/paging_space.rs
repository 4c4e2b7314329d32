//! Paging Space - the disk-backed virtual frame cache.
//!
//! The [`PagingSpace`] provides:
//! - Cold and warm start, and a persisting shutdown
//! - Reference-counted access to virtual frames by address
//! - Demand paging through a fixed pool of real frames
//! - Dirty write-back when a released frame is reused

use std::path::Path;
use std::sync::atomic::Ordering;

use tracing::{debug, error, info, warn};

use crate::buffer::consistency::{self, ConsistencyReport};
use crate::buffer::{FrameCounts, FrameState, PagingStats, RealFramePool, VirtualFrameIndex};
use crate::common::config::{DEFAULT_FRAME_SIZE, DEFAULT_REAL_FRAMES};
use crate::common::{
    DiagnosticLevel, Error, FileNo, FrameId, Geometry, PagingConfig, Result, StatusCode, VFrameId,
    Vaddr, Xaddr,
};
use crate::storage::control::{read_control, write_control, ControlHeader, VFrameRecord};
use crate::storage::{FileChannel, FileTable};

/// How an access was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// The caller may modify the frame; it is marked dirty.
    Change,
    /// Read-only.
    Reference,
}

/// A reference to a resident virtual frame, returned by the access calls.
///
/// The handle stays usable until the matching [`PagingSpace::release`]. After
/// that the frame may be rebound to another virtual frame and the handle is
/// rejected with [`Error::StaleAccess`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameAccess {
    vaddr: Vaddr,
    frame: FrameId,
    offset: usize,
    binding: u64,
    mode: AccessMode,
}

impl FrameAccess {
    /// The address the access was made with.
    #[inline]
    pub fn vaddr(&self) -> Vaddr {
        self.vaddr
    }

    /// Real frame holding the virtual frame.
    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame
    }

    /// Byte offset of `vaddr` inside the frame.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    pub fn mode(&self) -> AccessMode {
        self.mode
    }
}

/// Residency of a virtual address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// Never allocated.
    Unmapped,
    /// Allocated, currently only in its backing file.
    NonResident,
    /// Bound to a real frame.
    Resident,
}

impl FrameStatus {
    /// Status code for this residency.
    pub fn code(&self) -> StatusCode {
        match self {
            FrameStatus::Unmapped => StatusCode::VaddrInvalid,
            FrameStatus::NonResident => StatusCode::VaddrOnDisk,
            FrameStatus::Resident => StatusCode::Ok,
        }
    }
}

/// Everything that exists only while the paging space is initialized.
struct Space {
    geometry: Geometry,
    pool: RealFramePool,
    index: VirtualFrameIndex,
    files: FileTable,
    max_refcount: u32,
    diagnostics: DiagnosticLevel,
}

/// A paging space: virtual frames backed by data files, cached in a fixed
/// pool of real frames.
///
/// # Architecture
/// ```text
/// ┌─────────────────────────────────────────────────────────────┐
/// │                        PagingSpace                          │
/// │  ┌──────────────────┐      ┌───────────────────────────┐   │
/// │  │ VirtualFrameIndex│      │      RealFramePool        │   │
/// │  │ vaddr → VFrameId │─────▶│ [F0] [F1] [F2] ... [FN-1] │   │
/// │  │ (hash + chains)  │◀─────│ owner back-references     │   │
/// │  └──────────────────┘      └───────────────────────────┘   │
/// │  ┌──────────────────┐  ┌──────────────┐  ┌─────────────┐   │
/// │  │    FileTable     │  │  free list   │  │  eviction   │   │
/// │  │ 0: control, 1..N │  │ Vec<FrameId> │  │  queue      │   │
/// │  └──────────────────┘  └──────────────┘  └─────────────┘   │
/// └─────────────────────────────────────────────────────────────┘
/// ```
///
/// # Usage
/// ```no_run
/// use pagingspace::{PagingConfig, PagingSpace, Vaddr};
///
/// let mut space = PagingSpace::new();
/// space.cold(&PagingConfig::new("space.ctl").with_frame_size(4096))?;
/// space.ins_file("space.dat")?;
///
/// let access = space.access_chg(Vaddr(0x10_0000))?;
/// space.frame_mut(&access)?[0] = 0xAB;
/// space.release(Vaddr(0x10_0000))?;
///
/// space.term()?;
/// # Ok::<(), pagingspace::Error>(())
/// ```
///
/// Every operation on an uninitialized space fails with
/// [`Error::NotInitialized`]. A fatal error shuts the space down without
/// rewriting the control file.
pub struct PagingSpace {
    space: Option<Space>,
    stats: PagingStats,
}

impl PagingSpace {
    /// An uninitialized paging space. Call [`cold`](Self::cold) or
    /// [`warm`](Self::warm) before use.
    pub fn new() -> Self {
        Self {
            space: None,
            stats: PagingStats::new(),
        }
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.space.is_some()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Start an empty paging space, creating (or truncating) the control
    /// file. A frame size or real frame count of 0 selects the default.
    ///
    /// # Errors
    /// - `Error::AlreadyInitialized` if the space is running
    /// - `Error::FrameSize` for an illegal frame size
    /// - `Error::InvalidParameter` for a zero reference ceiling or bad
    ///   bucket sizes
    /// - `Error::Io` if the control file cannot be created
    pub fn cold(&mut self, config: &PagingConfig) -> Result<()> {
        if self.space.is_some() {
            return Err(Error::AlreadyInitialized);
        }

        let frame_size = match config.frame_size {
            0 => DEFAULT_FRAME_SIZE,
            n => n,
        };
        let real_frames = match config.real_frames {
            0 => DEFAULT_REAL_FRAMES,
            n => n,
        };
        check_max_refcount(config)?;

        let geometry = Geometry::new(frame_size)?;
        let pool = RealFramePool::new(&geometry, real_frames)?;
        let index = VirtualFrameIndex::new(config.bucket_sizes.clone())?;
        let files = FileTable::create_control(&config.control_file)?;

        self.stats.reset();
        self.space = Some(Space {
            geometry,
            pool,
            index,
            files,
            max_refcount: config.max_refcount,
            diagnostics: config.diagnostics,
        });

        info!(
            control = %config.control_file.display(),
            frame_size,
            real_frames,
            "paging space cold started"
        );
        Ok(())
    }

    /// Restart a paging space from the control file written by the last
    /// [`term`](Self::term).
    ///
    /// The frame size comes from the control file; a non-zero requested
    /// size must match it. A non-zero requested real frame count replaces
    /// the persisted one. Every virtual frame starts out non-resident.
    ///
    /// # Errors
    /// - `Error::AlreadyInitialized` if the space is running
    /// - `Error::FrameSize` if the requested frame size is illegal
    /// - `Error::ControlFile` if the control file is corrupt or mismatched
    /// - `Error::Inconsistent` if the rebuilt structures fail the
    ///   consistency check
    /// - `Error::Io` if a file cannot be opened or read
    pub fn warm(&mut self, config: &PagingConfig) -> Result<()> {
        if self.space.is_some() {
            return Err(Error::AlreadyInitialized);
        }

        match Space::load(config) {
            Ok(space) => {
                info!(
                    control = %config.control_file.display(),
                    frame_size = space.geometry.frame_size(),
                    real_frames = space.pool.len(),
                    vframes = space.index.len(),
                    files = space.files.len(),
                    "paging space warm started"
                );
                self.stats.reset();
                self.space = Some(space);
                Ok(())
            }
            Err(e) => {
                error!(control = %config.control_file.display(), error = %e, "warm start failed");
                Err(e)
            }
        }
    }

    /// Shut the space down: report diagnostics, write back every dirty
    /// frame, persist the control file and sync every file.
    ///
    /// Shutdown always completes; the first error encountered is returned.
    /// Terminating an uninitialized space is a no-op.
    pub fn term(&mut self) -> Result<()> {
        let Some(mut space) = self.space.take() else {
            return Ok(());
        };

        if space.diagnostics >= DiagnosticLevel::Stats {
            info!(stats = %self.stats.snapshot(), counts = %space.pool.counts(), "paging statistics");
        }
        if space.diagnostics >= DiagnosticLevel::Dump {
            space.dump();
        }

        let mut first_err = None;
        if let Err(e) = space.write_back_all(&self.stats, false) {
            first_err.get_or_insert(e);
        }
        match space.persist() {
            Ok(header) => debug!(
                files = header.file_count,
                vframes = header.vframe_count,
                "control file written"
            ),
            Err(e) => {
                error!(error = %e, "failed to write control file");
                first_err.get_or_insert(e);
            }
        }
        if let Err(e) = space.files.sync_all() {
            first_err.get_or_insert(e);
        }

        info!("paging space terminated");
        first_err.map_or(Ok(()), Err)
    }

    // ========================================================================
    // Access
    // ========================================================================

    /// Reference a virtual frame for change, faulting it in if needed.
    ///
    /// An address that was never used is given storage first. The frame is
    /// marked dirty and its reference count incremented.
    ///
    /// # Errors
    /// - `Error::NoStorage` if an unmapped address cannot be given storage
    /// - `Error::NoRealStorage` if every real frame is referenced
    /// - `Error::RefcountSaturated` at the reference ceiling
    /// - `Error::Io` if a write-back or read fails
    pub fn access_chg(&mut self, vaddr: Vaddr) -> Result<FrameAccess> {
        self.with_space(|s, stats| s.access(vaddr, AccessMode::Change, stats))
    }

    /// Reference a virtual frame read-only, faulting it in if needed.
    ///
    /// Same behavior as [`access_chg`](Self::access_chg) without marking the
    /// frame dirty.
    pub fn access_ref(&mut self, vaddr: Vaddr) -> Result<FrameAccess> {
        self.with_space(|s, stats| s.access(vaddr, AccessMode::Reference, stats))
    }

    /// Upgrade an existing reference to a change reference.
    ///
    /// Marks the frame dirty without taking another reference.
    ///
    /// # Errors
    /// - `Error::VaddrInvalid` if the address was never allocated
    /// - `Error::VaddrOnDisk` if the frame is not resident
    /// - `Error::NotReferenced` if nobody holds a reference
    pub fn access_sci(&mut self, vaddr: Vaddr) -> Result<FrameAccess> {
        self.with_space(|s, stats| s.upgrade(vaddr, stats))
    }

    /// Drop one reference. At zero the frame joins the eviction queue tail.
    ///
    /// # Errors
    /// - `Error::VaddrInvalid` if the address was never allocated
    /// - `Error::NotReferenced` if the frame is not referenced
    pub fn release(&mut self, vaddr: Vaddr) -> Result<()> {
        self.with_space(|s, stats| s.release(vaddr, stats))
    }

    /// Bytes of a referenced frame.
    ///
    /// # Errors
    /// `Error::StaleAccess` if the reference was released or the frame has
    /// been rebound since.
    pub fn frame(&self, access: &FrameAccess) -> Result<&[u8]> {
        let space = self.space.as_ref().ok_or(Error::NotInitialized)?;
        space.check_access(access)?;
        Ok(space.pool.bytes(access.frame))
    }

    /// Mutable bytes of a frame referenced for change.
    ///
    /// # Errors
    /// - `Error::StaleAccess` as for [`frame`](Self::frame)
    /// - `Error::InvalidParameter` if the frame is not marked for change
    pub fn frame_mut(&mut self, access: &FrameAccess) -> Result<&mut [u8]> {
        let space = self.space.as_mut().ok_or(Error::NotInitialized)?;
        space.check_access(access)?;
        if !space.pool.frame(access.frame).is_dirty() {
            return Err(Error::InvalidParameter(format!(
                "{} was not accessed for change",
                access.vaddr
            )));
        }
        Ok(space.pool.bytes_mut(access.frame))
    }

    // ========================================================================
    // Mapping
    // ========================================================================

    /// Residency of a virtual address. Never changes any state.
    pub fn status(&self, vaddr: Vaddr) -> Result<FrameStatus> {
        let space = self.space.as_ref().ok_or(Error::NotInitialized)?;
        let status = match space.index.find(space.geometry.frame_of(vaddr)) {
            None => FrameStatus::Unmapped,
            Some(id) if space.index.get(id).frame().is_some() => FrameStatus::Resident,
            Some(_) => FrameStatus::NonResident,
        };
        Ok(status)
    }

    /// Give a virtual frame external storage without faulting it in.
    ///
    /// With `file == None` the data file is chosen round-robin.
    ///
    /// # Errors
    /// - `Error::AlreadyMapped` if the frame already has storage
    /// - `Error::InvalidParameter` if `file` is not a data file
    /// - `Error::NoStorage` if no data file exists
    pub fn allocate(&mut self, file: Option<FileNo>, vaddr: Vaddr) -> Result<Xaddr> {
        self.with_space(|s, stats| {
            let frame_vaddr = s.geometry.frame_of(vaddr);
            if s.index.find(frame_vaddr).is_some() {
                return Err(Error::AlreadyMapped(vaddr));
            }
            let id = s.map_vframe(file, frame_vaddr, stats)?;
            Ok(s.index.get(id).xaddr())
        })
    }

    /// Add a backing data file, creating (or truncating) it.
    pub fn ins_file<P: AsRef<Path>>(&mut self, path: P) -> Result<FileNo> {
        let path = path.as_ref();
        self.with_space(|s, _| {
            let file = s.files.insert(path, &s.geometry)?;
            info!(file = %file, path = %path.display(), "added backing file");
            Ok(file)
        })
    }

    /// Write back every dirty frame without releasing anything.
    ///
    /// Referenced frames stay marked dirty since their holders may still
    /// change them.
    pub fn flush(&mut self) -> Result<()> {
        self.with_space(|s, stats| s.write_back_all(stats, true))
    }

    // ========================================================================
    // Info
    // ========================================================================

    /// Number of real frames, 0 when not initialized.
    pub fn frame_count(&self) -> usize {
        self.space.as_ref().map_or(0, |s| s.pool.len())
    }

    /// Frame size in bytes, 0 when not initialized.
    pub fn frame_size(&self) -> usize {
        self.space.as_ref().map_or(0, |s| s.geometry.frame_size())
    }

    /// Number of virtual frames with external storage.
    pub fn vframe_count(&self) -> usize {
        self.space.as_ref().map_or(0, |s| s.index.len())
    }

    /// Number of files, control file included.
    pub fn file_count(&self) -> usize {
        self.space.as_ref().map_or(0, |s| s.files.len())
    }

    /// Reference count of a resident frame.
    pub fn refcount(&self, vaddr: Vaddr) -> Option<u32> {
        let space = self.space.as_ref()?;
        let id = space.index.find(space.geometry.frame_of(vaddr))?;
        let frame = space.index.get(id).frame()?;
        Some(space.pool.frame(frame).refc())
    }

    /// Whether a resident frame is marked dirty.
    pub fn is_dirty(&self, vaddr: Vaddr) -> Option<bool> {
        let space = self.space.as_ref()?;
        let id = space.index.find(space.geometry.frame_of(vaddr))?;
        let frame = space.index.get(id).frame()?;
        Some(space.pool.frame(frame).is_dirty())
    }

    pub fn stats(&self) -> &PagingStats {
        &self.stats
    }

    pub fn frame_counts(&self) -> Result<FrameCounts> {
        let space = self.space.as_ref().ok_or(Error::NotInitialized)?;
        Ok(space.pool.counts())
    }

    /// Run the full structural self-check.
    ///
    /// # Errors
    /// `Error::Inconsistent` if any invariant is broken. This is fatal: the
    /// space shuts down without rewriting the control file.
    pub fn check_consistency(&mut self) -> Result<ConsistencyReport> {
        self.with_space(|s, _| s.verify())
    }

    /// Log every real frame at debug level.
    pub fn debug_dump(&self) {
        if let Some(space) = &self.space {
            space.dump();
        }
    }

    // ========================================================================
    // Internal
    // ========================================================================

    /// Run an operation on the initialized space, shutting down on a fatal
    /// error. An internal logic error is followed by a consistency check
    /// whose failure is fatal as well.
    fn with_space<T>(&mut self, op: impl FnOnce(&mut Space, &PagingStats) -> Result<T>) -> Result<T> {
        let space = self.space.as_mut().ok_or(Error::NotInitialized)?;
        let err = match op(space, &self.stats) {
            Ok(value) => return Ok(value),
            Err(e @ Error::InternalLogic { .. }) => match space.verify() {
                Ok(_) => e,
                Err(inconsistent) => inconsistent,
            },
            Err(e) => e,
        };
        if err.is_fatal() {
            self.shutdown_fatal(&err);
        }
        Err(err)
    }

    /// Tear down without persisting. The last good control file is left
    /// alone.
    fn shutdown_fatal(&mut self, err: &Error) {
        error!(error = %err, status = %err.status(), "fatal paging error, shutting down");
        if let Some(space) = self.space.take() {
            space.dump();
        }
    }
}

impl Default for PagingSpace {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PagingSpace {
    fn drop(&mut self) {
        if self.space.is_some() {
            if let Err(e) = self.term() {
                warn!(error = %e, "paging space shutdown on drop failed");
            }
        }
    }
}

fn check_max_refcount(config: &PagingConfig) -> Result<()> {
    if config.max_refcount == 0 {
        return Err(Error::InvalidParameter("max_refcount must be > 0".into()));
    }
    Ok(())
}

/// Internal logic error, fatal when extra checks are compiled in.
fn logic_error(message: String) -> Error {
    error!(%message, "internal logic error");
    Error::InternalLogic {
        message,
        fatal: cfg!(feature = "extra-checks"),
    }
}

impl Space {
    /// Rebuild a space from its control file.
    fn load(config: &PagingConfig) -> Result<Self> {
        check_max_refcount(config)?;
        if config.frame_size != 0 {
            Geometry::new(config.frame_size)?;
        }

        let mut control = FileChannel::open(&config.control_file)?;
        let image = read_control(&mut control)?;
        let header = image.header;

        let frame_size = header.frame_size as usize;
        if config.frame_size != 0 && config.frame_size != frame_size {
            return Err(Error::ControlFile(format!(
                "frame size {} requested, control file has {}",
                config.frame_size, frame_size
            )));
        }
        let geometry = Geometry::new(frame_size)
            .map_err(|_| Error::ControlFile(format!("illegal frame size {}", frame_size)))?;

        let pool = match config.real_frames {
            0 => {
                let persisted = usize::try_from(header.real_frames).map_err(|_| {
                    Error::ControlFile(format!("real frame count {} too large", header.real_frames))
                })?;
                RealFramePool::new(&geometry, persisted).map_err(|e| match e {
                    Error::InvalidParameter(message) => Error::ControlFile(message),
                    e => e,
                })?
            }
            n => RealFramePool::new(&geometry, n)?,
        };

        let files = FileTable::restore(control, image.files, header.next_file as usize)?;

        let mut index = VirtualFrameIndex::new(config.bucket_sizes.clone())?;
        index.restore(image.vframes.iter().map(|r| (r.vaddr, Xaddr(r.xaddr))))?;

        let space = Self {
            geometry,
            pool,
            index,
            files,
            max_refcount: config.max_refcount,
            diagnostics: config.diagnostics,
        };

        space.verify()?;
        Ok(space)
    }

    fn consistency(&self) -> ConsistencyReport {
        consistency::check(&self.geometry, &self.pool, &self.index, self.files.len())
    }

    /// Consistency check that logs every violation and turns a failing
    /// report into `Error::Inconsistent`.
    fn verify(&self) -> Result<ConsistencyReport> {
        let report = self.consistency();
        if report.is_ok() {
            return Ok(report);
        }
        for violation in &report.violations {
            error!(%violation, "paging space is inconsistent");
        }
        Err(Error::Inconsistent(report.violations.len()))
    }

    /// Hash lookup of a frame-aligned address, counted in the statistics.
    fn lookup(&mut self, frame_vaddr: u64, stats: &PagingStats) -> Option<VFrameId> {
        PagingStats::bump(&stats.lookups);
        let lookup = self.index.lookup(frame_vaddr);
        stats.hash_misses.fetch_add(lookup.hops, Ordering::Relaxed);
        lookup.found
    }

    /// Find the descriptor of a frame-aligned address, mapping it if new.
    fn resolve(&mut self, frame_vaddr: u64, stats: &PagingStats) -> Result<VFrameId> {
        match self.lookup(frame_vaddr, stats) {
            Some(id) => Ok(id),
            None => self.map_vframe(None, frame_vaddr, stats),
        }
    }

    /// Assign storage to a new virtual frame and add its descriptor.
    fn map_vframe(
        &mut self,
        file: Option<FileNo>,
        frame_vaddr: u64,
        stats: &PagingStats,
    ) -> Result<VFrameId> {
        let xaddr = self.files.assign(file, &self.geometry)?;
        let inserted = self.index.insert(frame_vaddr, xaddr);

        PagingStats::bump(&stats.vframes_allocated);
        if inserted.grew {
            PagingStats::bump(&stats.index_growths);
        }
        if inserted.rehashed {
            PagingStats::bump(&stats.rehashes);
        }
        debug!(vaddr = frame_vaddr, xaddr = %xaddr, "mapped virtual frame");

        Ok(inserted.id)
    }

    fn access(&mut self, vaddr: Vaddr, mode: AccessMode, stats: &PagingStats) -> Result<FrameAccess> {
        let vf = self.resolve(self.geometry.frame_of(vaddr), stats)?;

        let frame_id = match self.index.get(vf).frame() {
            Some(frame_id) => {
                self.check_saturation(frame_id, vaddr, stats)?;
                match self.pool.frame(frame_id).state() {
                    FrameState::OnLru => {
                        self.pool.reactivate(frame_id);
                        PagingStats::bump(&stats.reactivations);
                    }
                    FrameState::Allocated => PagingStats::bump(&stats.reuses),
                    FrameState::Available => {
                        return Err(logic_error(format!(
                            "{} resident in available {}",
                            vaddr, frame_id
                        )));
                    }
                }
                PagingStats::bump(&stats.hits);
                frame_id
            }
            None => self.fault_in(vf, stats)?,
        };

        let frame = self.pool.frame_mut(frame_id);
        frame.pin();
        if mode == AccessMode::Change {
            frame.mark_dirty();
        }

        Ok(FrameAccess {
            vaddr,
            frame: frame_id,
            offset: self.geometry.offset_of(vaddr),
            binding: frame.binding(),
            mode,
        })
    }

    fn check_saturation(&self, frame_id: FrameId, vaddr: Vaddr, stats: &PagingStats) -> Result<()> {
        let refc = self.pool.frame(frame_id).refc();
        if refc >= self.max_refcount {
            PagingStats::bump(&stats.saturations);
            warn!(%vaddr, refc, "reference count saturated");
            return Err(Error::RefcountSaturated {
                vaddr,
                max: self.max_refcount,
            });
        }
        Ok(())
    }

    /// Bind a real frame to a non-resident virtual frame and read its page.
    fn fault_in(&mut self, vf: VFrameId, stats: &PagingStats) -> Result<FrameId> {
        let frame_id = match self.pool.take_free() {
            Some(frame_id) => frame_id,
            None => self.evict(stats)?,
        };
        PagingStats::bump(&stats.faults);

        self.pool.frame_mut(frame_id).bind(vf);
        self.index.get_mut(vf).set_frame(Some(frame_id));

        let xaddr = self.index.get(vf).xaddr();
        if let Err(e) = self.read_frame(frame_id, xaddr) {
            warn!(frame = %frame_id, xaddr = %xaddr, error = %e, "page read failed");
            self.index.get_mut(vf).set_frame(None);
            self.pool.give_back(frame_id);
            return Err(e);
        }
        PagingStats::bump(&stats.pages_read);

        Ok(frame_id)
    }

    /// Take the oldest released frame, writing it back if dirty, and detach
    /// it from its virtual frame.
    fn evict(&mut self, stats: &PagingStats) -> Result<FrameId> {
        let victim = self.pool.pop_victim().ok_or(Error::NoRealStorage)?;

        let Some(owner) = self.pool.frame(victim).owner() else {
            self.pool.give_back(victim);
            return Err(logic_error(format!("{} queued without an owner", victim)));
        };

        if self.pool.frame(victim).is_dirty() {
            let xaddr = self.index.get(owner).xaddr();
            if let Err(e) = self.write_frame(victim, xaddr) {
                warn!(frame = %victim, xaddr = %xaddr, error = %e, "write-back failed, eviction abandoned");
                self.pool.restore_victim(victim);
                return Err(e);
            }
            PagingStats::bump(&stats.pages_written);
        }

        self.index.get_mut(owner).set_frame(None);
        self.pool.frame_mut(victim).unbind();
        PagingStats::bump(&stats.evictions);
        debug!(frame = %victim, vaddr = self.index.get(owner).vaddr(), "evicted");

        Ok(victim)
    }

    fn upgrade(&mut self, vaddr: Vaddr, stats: &PagingStats) -> Result<FrameAccess> {
        let vf = self
            .lookup(self.geometry.frame_of(vaddr), stats)
            .ok_or(Error::VaddrInvalid(vaddr))?;
        let frame_id = self.index.get(vf).frame().ok_or(Error::VaddrOnDisk(vaddr))?;

        let frame = self.pool.frame_mut(frame_id);
        if !frame.is_pinned() {
            return Err(Error::NotReferenced(vaddr));
        }
        frame.mark_dirty();

        Ok(FrameAccess {
            vaddr,
            frame: frame_id,
            offset: self.geometry.offset_of(vaddr),
            binding: frame.binding(),
            mode: AccessMode::Change,
        })
    }

    fn release(&mut self, vaddr: Vaddr, stats: &PagingStats) -> Result<()> {
        let vf = self
            .lookup(self.geometry.frame_of(vaddr), stats)
            .ok_or(Error::VaddrInvalid(vaddr))?;
        let frame_id = self.index.get(vf).frame().ok_or(Error::NotReferenced(vaddr))?;

        let frame = self.pool.frame_mut(frame_id);
        if frame.owner() != Some(vf) {
            return Err(logic_error(format!(
                "{} bound to {} owned by {:?}",
                vf,
                frame_id,
                frame.owner()
            )));
        }
        if !frame.is_pinned() {
            warn!(%vaddr, "release without an outstanding reference");
            return Err(Error::NotReferenced(vaddr));
        }

        if frame.unpin() == 0 && !self.pool.enqueue(frame_id) {
            return Err(logic_error(format!("{} was already queued", frame_id)));
        }
        Ok(())
    }

    fn check_access(&self, access: &FrameAccess) -> Result<()> {
        let stale = || Error::StaleAccess(access.vaddr);
        if access.frame.0 >= self.pool.len() {
            return Err(stale());
        }
        let frame = self.pool.frame(access.frame);
        if frame.binding() != access.binding || !frame.is_pinned() {
            return Err(stale());
        }
        let owner = frame.owner().ok_or_else(stale)?;
        if self.index.get(owner).vaddr() != self.geometry.frame_of(access.vaddr) {
            return Err(stale());
        }
        Ok(())
    }

    fn read_frame(&mut self, frame_id: FrameId, xaddr: Xaddr) -> Result<()> {
        let offset = self.geometry.xaddr_offset(xaddr);
        let channel = self.files.channel(self.geometry.xaddr_file(xaddr))?;
        channel.read_at(offset, self.pool.bytes_mut(frame_id))
    }

    fn write_frame(&mut self, frame_id: FrameId, xaddr: Xaddr) -> Result<()> {
        let offset = self.geometry.xaddr_offset(xaddr);
        let channel = self.files.channel(self.geometry.xaddr_file(xaddr))?;
        channel.write_at(offset, self.pool.bytes(frame_id))
    }

    /// Write back every dirty resident frame, continuing past failures.
    fn write_back_all(&mut self, stats: &PagingStats, keep_referenced_dirty: bool) -> Result<()> {
        let mut first_err = None;

        for i in 0..self.pool.len() {
            let frame_id = FrameId::new(i);
            let frame = self.pool.frame(frame_id);
            let Some(owner) = frame.owner() else {
                continue;
            };
            if !frame.is_dirty() {
                continue;
            }
            let keep_dirty = keep_referenced_dirty && frame.is_pinned();

            let xaddr = self.index.get(owner).xaddr();
            match self.write_frame(frame_id, xaddr) {
                Ok(()) => {
                    PagingStats::bump(&stats.pages_written);
                    if !keep_dirty {
                        self.pool.frame_mut(frame_id).clear_dirty();
                    }
                }
                Err(e) => {
                    warn!(frame = %frame_id, xaddr = %xaddr, error = %e, "write-back failed");
                    first_err.get_or_insert(e);
                }
            }
        }

        first_err.map_or(Ok(()), Err)
    }

    /// Write the control file from the current state.
    fn persist(&mut self) -> Result<ControlHeader> {
        let header = ControlHeader::new(
            0,
            self.geometry.frame_size() as u32,
            self.pool.len() as u64,
            0,
            self.files.next_file() as u32,
        );
        let records = self.files.records();
        let vframes = self.index.iter().map(|(_, vf)| VFrameRecord {
            vaddr: vf.vaddr(),
            xaddr: vf.xaddr().0,
        });
        write_control(self.files.control(), header, &records, vframes)
    }

    fn dump(&self) {
        debug!(
            frame_size = self.geometry.frame_size(),
            vframes = self.index.len(),
            buckets = self.index.bucket_count(),
            files = self.files.len(),
            counts = %self.pool.counts(),
            "paging space dump"
        );
        for (frame_id, frame) in self.pool.iter() {
            let vaddr = frame.owner().map(|vf| self.index.get(vf).vaddr());
            debug!(
                frame = %frame_id,
                state = ?frame.state(),
                vaddr = ?vaddr,
                refc = frame.refc(),
                dirty = frame.is_dirty(),
                "real frame"
            );
        }
    }
}
