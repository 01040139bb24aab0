use crate::engine::{EngineEvent, Fileshare, QueuedFile, ReceivedFile};
use crate::event_manager::error::{EventManagerError, EventManagerResult};
use crate::event_manager::live::LiveTransfer;
use crate::mesh::{Peer, PeerResolver};
use crate::metrics;
use crate::notify::manager::{
    ACCEPT_ERROR_GENERIC, ACCEPT_FAILED_SUMMARY, ACCEPT_FILE_FAILED_SUMMARY,
    CANCEL_ERROR_GENERIC, CANCEL_FAILED_SUMMARY, DOWNLOAD_DIR_IS_A_SYMLINK,
    DOWNLOAD_DIR_IS_NOT_A_DIRECTORY, DOWNLOAD_DIR_NOT_FOUND, DOWNLOAD_DIR_NO_PERMISSIONS,
    NOT_ENOUGH_SPACE, TRANSFER_ALREADY_ACCEPTED, TRANSFER_NOT_CANCELABLE,
};
use crate::notify::{NotificationAction, NotificationManager, Notifier};
use crate::storage::Storage;
use crate::system::{is_writable, Filesystem, OsInfo};
use crate::transfer::{
    is_file_selected, Direction, File, Status, Transfer, TransferProgressInfo,
    MULTIPLE_FILES_PATH,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Closed transfers remembered to drop late engine events, the oldest are forgotten first
const MAX_CLOSED_TRANSFERS: usize = 1024;

/// Progress updates for a single transfer, closed after the terminal status
pub type ProgressReceiver = mpsc::UnboundedReceiver<TransferProgressInfo>;

/// Engine calls decided while holding the state lock and issued after releasing it
#[derive(Debug)]
enum Command {
    /// Ask the engine to close a transfer, finalize locally with `status` if it refuses
    Finalize { transfer_id: String, status: Status },
    /// Refuse a transfer nobody should see
    Reject { transfer_id: String },
    /// Download accepted files of an auto-accepted transfer
    Accept {
        transfer_id: String,
        peer: String,
        dst_path: String,
        file_ids: Vec<String>,
    },
}

struct State {
    live_transfers: HashMap<String, LiveTransfer>,
    /// At most one subscriber per transfer, the latest one wins
    subscriptions: HashMap<String, mpsc::UnboundedSender<TransferProgressInfo>>,
    /// Transfers that will not be tracked again, late engine events are dropped
    closed: HashSet<String>,
    closed_order: VecDeque<String>,
    /// Last snapshot of finalized transfers, layered over the store until it catches up
    finalized: HashMap<String, Transfer>,
    notification_manager: Option<NotificationManager>,
    fileshare: Option<Arc<dyn Fileshare>>,
    storage: Arc<dyn Storage>,
}

/// Consumes engine events and owns every in-flight transfer.
///
/// All state sits behind one lock, so events for the same transfer are serialized and
/// concurrent accepts observe each other. Engine commands are never issued while the
/// lock is held.
///
/// Progress channels are unbounded: a subscriber that stops reading only grows its own
/// queue and never stalls event processing. Ordering per transfer is preserved.
pub struct EventManager {
    state: Mutex<State>,
    peers: Arc<dyn PeerResolver>,
    filesystem: Arc<dyn Filesystem>,
    os_info: Arc<dyn OsInfo>,
    default_download_dir: Option<PathBuf>,
}

/// Notification text for a failed accept
fn accept_failure_reason(err: &EventManagerError) -> &'static str {
    match err {
        EventManagerError::AcceptDirNotFound => DOWNLOAD_DIR_NOT_FOUND,
        EventManagerError::AcceptDirIsASymlink => DOWNLOAD_DIR_IS_A_SYMLINK,
        EventManagerError::AcceptDirIsNotADirectory => DOWNLOAD_DIR_IS_NOT_A_DIRECTORY,
        EventManagerError::NoPermissionsToAcceptDirectory => DOWNLOAD_DIR_NO_PERMISSIONS,
        EventManagerError::SizeLimitExceeded => NOT_ENOUGH_SPACE,
        EventManagerError::TransferAlreadyAccepted => TRANSFER_ALREADY_ACCEPTED,
        _ => ACCEPT_ERROR_GENERIC,
    }
}

fn send_progress(state: &State, progress: TransferProgressInfo) {
    if let Some(tx) = state.subscriptions.get(&progress.transfer_id) {
        if tx.send(progress).is_err() {
            debug!("Progress subscriber is gone");
        }
    }
}

impl EventManager {
    pub fn new(
        storage: Arc<dyn Storage>,
        peers: Arc<dyn PeerResolver>,
        filesystem: Arc<dyn Filesystem>,
        os_info: Arc<dyn OsInfo>,
        default_download_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            state: Mutex::new(State {
                live_transfers: HashMap::new(),
                subscriptions: HashMap::new(),
                closed: HashSet::new(),
                closed_order: VecDeque::new(),
                finalized: HashMap::new(),
                notification_manager: None,
                fileshare: None,
                storage,
            }),
            peers,
            filesystem,
            os_info,
            default_download_dir,
        }
    }

    pub fn set_fileshare(&self, fileshare: Arc<dyn Fileshare>) {
        self.state.lock().fileshare = Some(fileshare);
    }

    pub fn enable_notifications(&self, notifier: Box<dyn Notifier>) -> EventManagerResult<()> {
        let mut state = self.state.lock();
        if state.notification_manager.is_some() {
            return Err(EventManagerError::NotificationsAlreadyEnabled);
        }
        state.notification_manager = Some(NotificationManager::new(notifier));
        Ok(())
    }

    pub fn disable_notifications(&self) -> EventManagerResult<()> {
        let manager = self
            .state
            .lock()
            .notification_manager
            .take()
            .ok_or(EventManagerError::NotificationsAlreadyDisabled)?;
        if let Err(e) = manager.disable() {
            warn!(error = %e, "Failed to close notifier");
        }
        Ok(())
    }

    pub fn are_notifications_enabled(&self) -> bool {
        self.state.lock().notification_manager.is_some()
    }

    /// Consume a single engine event. Errors are logged, the engine cannot act on them.
    pub fn on_event(&self, event: EngineEvent) {
        metrics::record_event(event.kind());

        // Peer lookups go to the mesh service, resolve before taking the lock
        let sender = match &event {
            EngineEvent::RequestReceived { peer, .. } => Some(self.resolve_peer(peer)),
            _ => None,
        };

        let commands = {
            let mut state = self.state.lock();
            let commands = self.handle_event(&mut state, event, sender.flatten());
            metrics::set_live_transfers(state.live_transfers.len());
            commands
        };
        self.run_commands(commands);
    }

    /// Parse and consume an engine callback payload
    pub fn on_event_json(&self, payload: &str) {
        match EngineEvent::from_json(payload) {
            Ok(event) => self.on_event(event),
            Err(e) => error!(error = %e, "Dropping engine event"),
        }
    }

    fn resolve_peer(&self, ip: &str) -> Option<Peer> {
        match self.peers.get_peers() {
            Ok(peers) => {
                let peer = peers.into_iter().find(|p| p.ip == ip);
                if peer.is_none() {
                    warn!(peer = ip, "Unknown peer when validating permissions");
                }
                peer
            }
            Err(e) => {
                warn!(error = %e, "Failed to get peers when validating permissions");
                None
            }
        }
    }

    fn handle_event(
        &self,
        state: &mut State,
        event: EngineEvent,
        sender: Option<Peer>,
    ) -> Vec<Command> {
        match event {
            EngineEvent::RequestReceived {
                transfer_id,
                peer,
                files,
            } => self.handle_request_received(state, transfer_id, peer, files, sender),
            EngineEvent::RequestQueued {
                transfer_id,
                peer,
                files,
            } => {
                self.handle_request_queued(state, transfer_id, peer, files);
                vec![]
            }
            EngineEvent::FileStarted {
                transfer_id,
                file_id,
                ..
            } => {
                if let Some(live) = Self::live_transfer(state, &transfer_id) {
                    if !live.mark_started(&file_id) {
                        debug!(%transfer_id, %file_id, "Start of unknown or finished file");
                    }
                }
                vec![]
            }
            EngineEvent::FileProgress {
                transfer_id,
                file_id,
                transferred,
            } => {
                let Some(live) = Self::live_transfer(state, &transfer_id) else {
                    return vec![];
                };
                let before = live.transfer.total_transferred;
                if !live.update_progress(&file_id, transferred) {
                    debug!(%transfer_id, %file_id, "Progress of unknown or finished file");
                    return vec![];
                }
                let direction = live.transfer.direction;
                let delta = live.transfer.total_transferred.saturating_sub(before);
                let progress = live.progress();

                metrics::record_bytes_transferred(direction, delta);
                send_progress(state, progress);
                vec![]
            }
            EngineEvent::FileDownloaded {
                transfer_id,
                file_id,
                final_path,
            } => self.handle_file_finished(
                state,
                &transfer_id,
                &file_id,
                Status::Success,
                Some(final_path),
            ),
            EngineEvent::FileUploaded {
                transfer_id,
                file_id,
            } => self.handle_file_finished(state, &transfer_id, &file_id, Status::Success, None),
            EngineEvent::FileRejected {
                transfer_id,
                file_id,
                by_peer,
            } => {
                debug!(%transfer_id, %file_id, by_peer, "File rejected");
                self.handle_file_finished(state, &transfer_id, &file_id, Status::Canceled, None)
            }
            EngineEvent::FileFailed {
                transfer_id,
                file_id,
                status,
            } => {
                warn!(%transfer_id, %file_id, status = ?status.status, "File failed");
                let status = status.status.to_status();
                self.handle_file_finished(state, &transfer_id, &file_id, status, None)
            }
            EngineEvent::TransferFailed {
                transfer_id,
                status,
            } => {
                warn!(%transfer_id, status = ?status.status, "Transfer failed");
                let status = status.status.to_status();
                if let Some(live) = Self::live_transfer(state, &transfer_id) {
                    live.finish_remaining(status);
                }
                Self::finalize_transfer(state, &transfer_id, status);
                vec![]
            }
            EngineEvent::TransferFinalized {
                transfer_id,
                by_peer,
            } => {
                self.handle_transfer_finalized(state, &transfer_id, by_peer);
                vec![]
            }
            EngineEvent::Unknown(kind) => {
                warn!(kind = %kind, "Ignoring unknown engine event");
                vec![]
            }
        }
    }

    fn handle_request_received(
        &self,
        state: &mut State,
        transfer_id: String,
        peer_ip: String,
        files: Vec<ReceivedFile>,
        sender: Option<Peer>,
    ) -> Vec<Command> {
        let Some(sender) = sender.filter(|p| p.do_i_allow_fileshare) else {
            info!(%transfer_id, peer = %peer_ip, "Rejecting transfer from peer without fileshare permission");
            Self::close_transfer(state, &transfer_id, None);
            return vec![Command::Reject { transfer_id }];
        };

        let files: Vec<File> = files.iter().map(File::from).collect();
        let transfer = Transfer::new_incoming(transfer_id.clone(), peer_ip.clone(), files);
        info!(%transfer_id, peer = %peer_ip, files = transfer.files.len(), "New incoming transfer");
        state
            .live_transfers
            .insert(transfer_id.clone(), LiveTransfer::new(transfer));

        let autoaccept_dir = self
            .default_download_dir
            .as_ref()
            .filter(|_| sender.always_accept_files);

        let Some(dir) = autoaccept_dir else {
            if let Some(nm) = &state.notification_manager {
                nm.notify_new_transfer(&transfer_id, &peer_ip);
            }
            return vec![];
        };

        let dst_path = dir.to_string_lossy().into_owned();
        match self.accept_locked(state, &transfer_id, &dst_path, &[]) {
            Ok(transfer) => {
                if let Some(nm) = &state.notification_manager {
                    nm.notify_autoaccepted_transfer(&transfer_id, &peer_ip);
                }
                vec![Command::Accept {
                    transfer_id,
                    peer: peer_ip,
                    dst_path,
                    file_ids: transfer.files.iter().map(|f| f.id.clone()).collect(),
                }]
            }
            Err(e) => {
                warn!(%transfer_id, error = %e, "Failed to auto-accept transfer");
                if let Some(nm) = &state.notification_manager {
                    nm.notify_autoaccept_failed(&transfer_id, &peer_ip, accept_failure_reason(&e));
                }
                vec![]
            }
        }
    }

    fn handle_request_queued(
        &self,
        state: &mut State,
        transfer_id: String,
        peer: String,
        files: Vec<QueuedFile>,
    ) {
        let files: Vec<File> = files
            .iter()
            .map(|queued| {
                let mut file = File::new(queued.id.clone(), queued.size);
                if !queued.path.is_empty() {
                    file.path = queued.path.clone();
                }
                if let Some(base) = &queued.base_dir {
                    file.full_path = Path::new(base)
                        .join(&file.path)
                        .to_string_lossy()
                        .into_owned();
                }
                file
            })
            .collect();

        if let Some(live) = Self::live_transfer(state, &transfer_id) {
            live.adopt_files(files);
            return;
        }
        if state.closed.contains(&transfer_id) {
            return;
        }

        // The engine may queue before the sender registered the transfer
        let path = match files.as_slice() {
            [single] if !single.full_path.is_empty() => single.full_path.clone(),
            [single] => single.path.clone(),
            _ => MULTIPLE_FILES_PATH.to_string(),
        };
        let transfer = Transfer::new_outgoing(transfer_id.clone(), peer, path, files);
        state
            .live_transfers
            .insert(transfer_id, LiveTransfer::new(transfer));
    }

    fn handle_file_finished(
        &self,
        state: &mut State,
        transfer_id: &str,
        file_id: &str,
        status: Status,
        final_path: Option<String>,
    ) -> Vec<Command> {
        let Some(live) = Self::live_transfer(state, transfer_id) else {
            return vec![];
        };
        let Some(mut file) = live.finish_file(file_id, status) else {
            debug!(transfer_id, file_id, "Finish of unknown or already finished file");
            return vec![];
        };
        if let Some(final_path) = final_path {
            file.full_path = final_path.clone();
            if let Some(f) = live.transfer.find_file_mut(file_id) {
                f.full_path = final_path;
            }
        }

        let direction = live.transfer.direction;
        let display_path = if !file.full_path.is_empty() {
            file.full_path.clone()
        } else if live.transfer.path.is_empty() || live.transfer.path == MULTIPLE_FILES_PATH {
            file.path.clone()
        } else {
            Path::new(&live.transfer.path)
                .join(&file.path)
                .to_string_lossy()
                .into_owned()
        };

        metrics::record_file_finished(status);
        if let Some(nm) = &state.notification_manager {
            nm.notify_file(&display_path, direction, status);
        }

        self.finalize_finished_transfer(state, transfer_id)
    }

    /// Close out a transfer whose files are all terminal. Incoming transfers are handed
    /// back to the engine, which answers with `TransferFinalized`.
    fn finalize_finished_transfer(&self, state: &mut State, transfer_id: &str) -> Vec<Command> {
        let Some(live) = state.live_transfers.get_mut(transfer_id) else {
            return vec![];
        };
        if !live.is_finished() {
            return vec![];
        }

        let status = live.refresh_status();
        match live.transfer.direction {
            Direction::Incoming => vec![Command::Finalize {
                transfer_id: transfer_id.to_string(),
                status,
            }],
            _ => {
                Self::finalize_transfer(state, transfer_id, status);
                vec![]
            }
        }
    }

    fn handle_transfer_finalized(&self, state: &mut State, transfer_id: &str, by_peer: bool) {
        let Some(live) = Self::live_transfer(state, transfer_id) else {
            return;
        };

        let status = if live.is_finished() {
            // Recompute from the overlay before finalizing, the store may lag behind
            live.refresh_status()
        } else {
            let status = if by_peer {
                Status::CanceledByPeer
            } else {
                Status::Canceled
            };
            live.finish_remaining(Status::Canceled);
            status
        };

        Self::finalize_transfer(state, transfer_id, status);
    }

    /// Push the terminal status, close the subscription and drop the overlay.
    /// A no-op for transfers that are no longer live.
    fn finalize_transfer(state: &mut State, transfer_id: &str, status: Status) {
        let Some(mut live) = state.live_transfers.remove(transfer_id) else {
            return;
        };
        live.transfer.status = status;
        let progress = live.progress();

        if let Some(tx) = state.subscriptions.remove(transfer_id) {
            if tx.send(progress).is_err() {
                debug!(transfer_id, "Progress subscriber is gone");
            }
        }

        let duration = (Utc::now() - live.transfer.created)
            .to_std()
            .unwrap_or_default();
        metrics::record_transfer_finalized(live.transfer.direction, status, duration);
        info!(transfer_id, ?status, "Transfer finalized");

        Self::close_transfer(state, transfer_id, Some(live.transfer));
    }

    /// Stop tracking `transfer_id`. Past the cap the oldest closed transfer is forgotten
    /// together with its snapshot and the store answers for it from then on.
    fn close_transfer(state: &mut State, transfer_id: &str, snapshot: Option<Transfer>) {
        if state.closed.insert(transfer_id.to_string()) {
            state.closed_order.push_back(transfer_id.to_string());
        }
        if let Some(transfer) = snapshot {
            state.finalized.insert(transfer_id.to_string(), transfer);
        }
        while state.closed_order.len() > MAX_CLOSED_TRANSFERS {
            let Some(oldest) = state.closed_order.pop_front() else {
                break;
            };
            state.closed.remove(&oldest);
            state.finalized.remove(&oldest);
        }
    }

    /// Drop snapshots of transfers the store already reports as ended
    fn evict_caught_up(state: &mut State, stored: &HashMap<String, Transfer>) {
        state
            .finalized
            .retain(|id, _| !stored.get(id).is_some_and(|t| t.status.is_terminal()));
    }

    /// Final state of a transfer that is no longer live: its snapshot, or the stored copy
    /// once the snapshot is gone
    fn terminal_snapshot(state: &State, transfer_id: &str) -> Option<Transfer> {
        if let Some(transfer) = state.finalized.get(transfer_id) {
            return Some(transfer.clone());
        }
        if state.live_transfers.contains_key(transfer_id) {
            return None;
        }
        match state.storage.load() {
            Ok(mut transfers) => transfers
                .remove(transfer_id)
                .filter(|t| t.status.is_terminal()),
            Err(e) => {
                warn!(transfer_id, error = %e, "Failed to load transfers");
                None
            }
        }
    }

    /// Live overlay for `transfer_id`, adopted from the store on first use.
    /// Finalized transfers are never resurrected.
    fn live_transfer<'a>(state: &'a mut State, transfer_id: &str) -> Option<&'a mut LiveTransfer> {
        if state.closed.contains(transfer_id) {
            return None;
        }
        if !state.live_transfers.contains_key(transfer_id) {
            let stored = match state.storage.load() {
                Ok(mut transfers) => transfers.remove(transfer_id),
                Err(e) => {
                    warn!(transfer_id, error = %e, "Failed to load transfers");
                    None
                }
            };
            let Some(transfer) = stored else {
                warn!(transfer_id, "Event for unknown transfer");
                return None;
            };
            if transfer.status.is_terminal() {
                debug!(transfer_id, status = ?transfer.status, "Event for a transfer that already ended");
                return None;
            }
            state
                .live_transfers
                .insert(transfer_id.to_string(), LiveTransfer::new(transfer));
        }
        state.live_transfers.get_mut(transfer_id)
    }

    fn run_commands(&self, commands: Vec<Command>) {
        if commands.is_empty() {
            return;
        }
        let fileshare = self.state.lock().fileshare.clone();

        for command in commands {
            match command {
                Command::Reject { transfer_id } => match &fileshare {
                    Some(fs) => {
                        if let Err(e) = fs.finalize(&transfer_id) {
                            warn!(%transfer_id, error = %e, "Failed to reject transfer");
                        }
                    }
                    None => warn!(%transfer_id, "No engine to reject transfer with"),
                },
                Command::Finalize {
                    transfer_id,
                    status,
                } => {
                    let result = match &fileshare {
                        Some(fs) => fs.finalize(&transfer_id).map_err(|e| e.to_string()),
                        None => Err("engine not attached".to_string()),
                    };
                    if let Err(e) = result {
                        // Keep the state consistent with what the user sees
                        warn!(%transfer_id, error = %e, "Failed to finalize transfer, finalizing locally");
                        let mut state = self.state.lock();
                        Self::finalize_transfer(&mut state, &transfer_id, status);
                    }
                }
                Command::Accept {
                    transfer_id,
                    peer,
                    dst_path,
                    file_ids,
                } => {
                    let Some(fs) = &fileshare else {
                        warn!(%transfer_id, "No engine to accept transfer with");
                        continue;
                    };
                    let failed: Vec<&String> = file_ids
                        .iter()
                        .filter(|file_id| fs.accept(&transfer_id, &dst_path, file_id).is_err())
                        .collect();
                    if failed.is_empty() {
                        continue;
                    }

                    let all_failed = failed.len() == file_ids.len();
                    if let Some(nm) = &self.state.lock().notification_manager {
                        if all_failed {
                            nm.notify_autoaccept_failed(&transfer_id, &peer, ACCEPT_ERROR_GENERIC);
                        } else {
                            for file_id in &failed {
                                nm.notify_generic(ACCEPT_FILE_FAILED_SUMMARY, file_id);
                            }
                        }
                    }
                    if all_failed {
                        warn!(%transfer_id, "No file of auto-accepted transfer could be started");
                        self.fail_accept(&transfer_id);
                    }
                }
            }
        }
    }

    /// Validate an accept request and mark the transfer accepted.
    ///
    /// Download commands are left to the caller, one per accepted file.
    pub fn accept_transfer(
        &self,
        transfer_id: &str,
        dst_path: &str,
        file_ids: &[String],
    ) -> EventManagerResult<Transfer> {
        let mut state = self.state.lock();
        self.accept_locked(&mut state, transfer_id, dst_path, file_ids)
    }

    fn accept_locked(
        &self,
        state: &mut State,
        transfer_id: &str,
        dst_path: &str,
        file_ids: &[String],
    ) -> EventManagerResult<Transfer> {
        let available = self.check_accept_dir(Path::new(dst_path))?;

        if let Some(finalized) = Self::terminal_snapshot(state, transfer_id) {
            return Err(match (finalized.direction, finalized.status) {
                (Direction::Outgoing, _) => EventManagerError::TransferAcceptOutgoing,
                (_, Status::CanceledByPeer) => EventManagerError::TransferCanceledByPeer,
                (_, Status::Canceled) => EventManagerError::TransferCanceledByUs,
                _ => EventManagerError::TransferAlreadyAccepted,
            });
        }

        let live = Self::live_transfer(state, transfer_id)
            .ok_or_else(|| EventManagerError::TransferNotFound(transfer_id.to_string()))?;
        let transfer = &live.transfer;

        if transfer.direction != Direction::Incoming {
            return Err(EventManagerError::TransferAcceptOutgoing);
        }
        match transfer.status {
            Status::CanceledByPeer => return Err(EventManagerError::TransferCanceledByPeer),
            Status::Canceled => return Err(EventManagerError::TransferCanceledByUs),
            _ => {}
        }
        if live.accepted {
            return Err(EventManagerError::TransferAlreadyAccepted);
        }

        for requested in file_ids {
            let filter = std::slice::from_ref(requested);
            if !transfer.files.iter().any(|f| is_file_selected(f, filter)) {
                return Err(EventManagerError::FileNotFound(requested.clone()));
            }
        }

        let size: u64 = transfer.selected_files(file_ids).map(|f| f.size).sum();
        if size > available {
            return Err(EventManagerError::SizeLimitExceeded);
        }

        live.accepted = true;
        live.transfer.path = dst_path.to_string();
        info!(transfer_id, dst_path, bytes = size, "Transfer accepted");
        Ok(live.transfer.clone())
    }

    /// Destination must be an existing, writable, real directory. Returns free bytes.
    fn check_accept_dir(&self, path: &Path) -> EventManagerResult<u64> {
        let info = match self.filesystem.lstat(path) {
            Ok(info) => info,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(EventManagerError::AcceptDirNotFound)
            }
            Err(e) => return Err(e.into()),
        };
        if info.is_symlink {
            return Err(EventManagerError::AcceptDirIsASymlink);
        }
        if !info.is_dir {
            return Err(EventManagerError::AcceptDirIsNotADirectory);
        }

        let info = self.filesystem.stat(path)?;
        let gids = self.os_info.group_ids()?;
        if !is_writable(&info, self.os_info.current_uid(), &gids) {
            return Err(EventManagerError::NoPermissionsToAcceptDirectory);
        }

        Ok(self.filesystem.available_space(path)?)
    }

    /// Cancel files locally that were left out of an accepted subset.
    ///
    /// The engine's later `FileRejected` for these files is a no-op, so the transfer is
    /// finalized here when the canceled files were the last unfinished ones.
    pub fn cancel_files(&self, transfer_id: &str, file_ids: &[String]) {
        let commands = {
            let mut state = self.state.lock();
            let Some(live) = Self::live_transfer(&mut state, transfer_id) else {
                return;
            };
            for file_id in file_ids {
                live.finish_file(file_id, Status::Canceled);
            }
            self.finalize_finished_transfer(&mut state, transfer_id)
        };
        self.run_commands(commands);
    }

    /// Every download command of an accept failed, the transfer will not progress
    pub fn fail_accept(&self, transfer_id: &str) {
        let mut state = self.state.lock();
        if let Some(live) = Self::live_transfer(&mut state, transfer_id) {
            live.finish_remaining(Status::Canceled);
        }
        Self::finalize_transfer(&mut state, transfer_id, Status::AcceptFailure);
    }

    /// Register a transfer started by us, the engine queues its files later
    pub fn new_outgoing_transfer(&self, transfer_id: &str, peer: &str, path: &str) {
        let mut state = self.state.lock();
        if let Some(live) = state.live_transfers.get_mut(transfer_id) {
            live.transfer.path = path.to_string();
            return;
        }
        if state.closed.contains(transfer_id) {
            return;
        }
        let transfer = Transfer::new_outgoing(transfer_id, peer, path, vec![]);
        state
            .live_transfers
            .insert(transfer_id.to_string(), LiveTransfer::new(transfer));
    }

    /// Stored transfers with live and recently finalized state layered on top, oldest first
    pub fn get_transfers(&self) -> Vec<Transfer> {
        let mut state = self.state.lock();
        let mut transfers = match state.storage.load() {
            Ok(transfers) => transfers,
            Err(e) => {
                warn!(error = %e, "Failed to load transfers");
                HashMap::new()
            }
        };
        Self::evict_caught_up(&mut state, &transfers);

        for (id, transfer) in &state.finalized {
            transfers.insert(id.clone(), transfer.clone());
        }
        for (id, live) in &state.live_transfers {
            transfers.insert(id.clone(), live.transfer.clone());
        }

        let mut transfers: Vec<Transfer> = transfers.into_values().collect();
        transfers.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));
        transfers
    }

    pub fn get_transfer(&self, transfer_id: &str) -> EventManagerResult<Transfer> {
        let state = self.state.lock();
        if let Some(live) = state.live_transfers.get(transfer_id) {
            return Ok(live.transfer.clone());
        }
        if let Some(transfer) = state.finalized.get(transfer_id) {
            return Ok(transfer.clone());
        }

        state
            .storage
            .load()?
            .remove(transfer_id)
            .ok_or_else(|| EventManagerError::TransferNotFound(transfer_id.to_string()))
    }

    /// Register a progress channel, replacing any earlier one for the same transfer.
    ///
    /// A transfer that already ended yields its terminal status and a closed channel.
    pub fn subscribe(&self, transfer_id: &str) -> ProgressReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock();

        if let Some(transfer) = Self::terminal_snapshot(&state, transfer_id) {
            let _ = tx.send(TransferProgressInfo {
                transfer_id: transfer_id.to_string(),
                transferred: TransferProgressInfo::percent(
                    transfer.total_transferred,
                    transfer.total_size,
                ),
                status: transfer.status,
            });
            return rx;
        }
        if state.closed.contains(transfer_id) {
            return rx;
        }

        state.subscriptions.insert(transfer_id.to_string(), tx);
        rx
    }

    /// Finalize every live transfer, used on shutdown
    pub fn cancel_live_transfers(&self) {
        let (ids, fileshare) = {
            let state = self.state.lock();
            let ids: Vec<String> = state.live_transfers.keys().cloned().collect();
            (ids, state.fileshare.clone())
        };

        for transfer_id in ids {
            if let Some(fs) = &fileshare {
                if let Err(e) = fs.finalize(&transfer_id) {
                    warn!(%transfer_id, error = %e, "Failed to cancel transfer");
                }
            }

            let mut state = self.state.lock();
            let status = match state.live_transfers.get_mut(&transfer_id) {
                Some(live) if live.is_finished() => live.refresh_status(),
                Some(live) => {
                    live.finish_remaining(Status::Canceled);
                    Status::Canceled
                }
                None => continue,
            };
            Self::finalize_transfer(&mut state, &transfer_id, status);
        }
    }

    pub fn purge_transfers_until(&self, until: DateTime<Utc>) -> EventManagerResult<()> {
        let mut state = self.state.lock();
        state.storage.purge_transfers_until(until)?;
        state.finalized.retain(|_, t| t.created >= until);
        Ok(())
    }

    /// React to the user clicking on one of our notifications
    pub fn handle_notification_action(&self, action: NotificationAction) {
        match action {
            NotificationAction::OpenFile(id) => {
                if let Some(nm) = &self.state.lock().notification_manager {
                    nm.open_file(id);
                }
            }
            NotificationAction::Closed(id) => {
                if let Some(nm) = &self.state.lock().notification_manager {
                    nm.close_notification(id);
                }
            }
            NotificationAction::AcceptTransfer(id) => {
                if let Some(transfer_id) = self.take_action_transfer(id) {
                    self.accept_from_notification(&transfer_id);
                }
            }
            NotificationAction::CancelTransfer(id) => {
                if let Some(transfer_id) = self.take_action_transfer(id) {
                    self.cancel_from_notification(&transfer_id);
                }
            }
        }
    }

    fn take_action_transfer(&self, action_id: u32) -> Option<String> {
        let transfer_id = self
            .state
            .lock()
            .notification_manager
            .as_ref()
            .and_then(|nm| nm.take_transfer(action_id));
        if transfer_id.is_none() {
            warn!(action_id, "No transfer for notification action");
        }
        transfer_id
    }

    fn notify_generic(&self, summary: &str, body: &str) {
        if let Some(nm) = &self.state.lock().notification_manager {
            nm.notify_generic(summary, body);
        }
    }

    fn accept_from_notification(&self, transfer_id: &str) {
        let Some(dir) = &self.default_download_dir else {
            self.notify_generic(ACCEPT_FAILED_SUMMARY, DOWNLOAD_DIR_NOT_FOUND);
            return;
        };
        let dst_path = dir.to_string_lossy().into_owned();

        let transfer = match self.accept_transfer(transfer_id, &dst_path, &[]) {
            Ok(transfer) => transfer,
            Err(e) => {
                warn!(transfer_id, error = %e, "Failed to accept transfer from notification");
                self.notify_generic(ACCEPT_FAILED_SUMMARY, accept_failure_reason(&e));
                return;
            }
        };

        let Some(fs) = self.state.lock().fileshare.clone() else {
            self.notify_generic(ACCEPT_FAILED_SUMMARY, ACCEPT_ERROR_GENERIC);
            return;
        };
        for file in &transfer.files {
            if let Err(e) = fs.accept(transfer_id, &dst_path, &file.id) {
                warn!(transfer_id, file_id = %file.id, error = %e, "Failed to accept file");
                self.notify_generic(ACCEPT_FILE_FAILED_SUMMARY, &file.path);
            }
        }
    }

    fn cancel_from_notification(&self, transfer_id: &str) {
        let transfer = match self.get_transfer(transfer_id) {
            Ok(transfer) => transfer,
            Err(e) => {
                warn!(transfer_id, error = %e, "Failed to cancel transfer from notification");
                self.notify_generic(CANCEL_FAILED_SUMMARY, CANCEL_ERROR_GENERIC);
                return;
            }
        };
        if !transfer.status.is_active() {
            self.notify_generic(CANCEL_FAILED_SUMMARY, TRANSFER_NOT_CANCELABLE);
            return;
        }

        let Some(fs) = self.state.lock().fileshare.clone() else {
            self.notify_generic(CANCEL_FAILED_SUMMARY, CANCEL_ERROR_GENERIC);
            return;
        };
        if let Err(e) = fs.finalize(transfer_id) {
            warn!(transfer_id, error = %e, "Failed to cancel transfer from notification");
            self.notify_generic(CANCEL_FAILED_SUMMARY, &e.to_string());
        }
    }
}
