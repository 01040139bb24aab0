use crate::config::FileshareConfig;
use crate::engine::Fileshare;
use crate::event_manager::{EventManager, EventManagerError, ProgressReceiver};
use crate::mesh::{peer_lookup, NewTransferNotification, Peer, PeerResolver, PeerStatus};
use crate::notify::{Notifier, NotifyResult};
use crate::service::error::{FileshareErrorCode, ServiceError, ServiceErrorCode, ServiceResult};
use crate::service::types::{
    AcceptRequest, ListResponse, SendRequest, SetNotificationsStatus, StatusResponse,
};
use crate::system::Filesystem;
use crate::transfer::{is_file_selected, File, Status, MULTIPLE_FILES_PATH};
use chrono::{DateTime, Utc};
use std::io;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

const STATUS_STREAM_BUFFER: usize = 32;

/// Messages of a Send or Accept call. The stream ends after a terminal status; dropping
/// it stops the updates but never the transfer.
pub type StatusStream = mpsc::Receiver<StatusResponse>;

/// Builds the notifier used when notifications get enabled at runtime
pub type NotifierFactory = Box<dyn Fn() -> NotifyResult<Box<dyn Notifier>> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceLimits {
    pub dir_depth_limit: usize,
    pub transfer_file_limit: usize,
    pub list_chunk_size: usize,
}

impl From<&FileshareConfig> for ServiceLimits {
    fn from(config: &FileshareConfig) -> Self {
        Self {
            dir_depth_limit: config.dir_depth_limit,
            transfer_file_limit: config.transfer_file_limit,
            list_chunk_size: config.list_chunk_size,
        }
    }
}

impl Default for ServiceLimits {
    fn default() -> Self {
        (&FileshareConfig::default()).into()
    }
}

enum CountError {
    TooDeep,
    Io(io::Error),
}

impl From<io::Error> for CountError {
    fn from(err: io::Error) -> Self {
        CountError::Io(err)
    }
}

fn single(response: StatusResponse) -> StatusStream {
    let (tx, rx) = mpsc::channel(1);
    // A fresh channel always has room for one message
    let _ = tx.try_send(response);
    rx
}

fn accept_error_code(err: &EventManagerError) -> FileshareErrorCode {
    match err {
        EventManagerError::TransferNotFound(_) => FileshareErrorCode::TransferNotFound,
        EventManagerError::FileNotFound(_) => FileshareErrorCode::FileNotFound,
        EventManagerError::TransferAcceptOutgoing => FileshareErrorCode::AcceptOutgoing,
        EventManagerError::TransferAlreadyAccepted => FileshareErrorCode::AlreadyAccepted,
        EventManagerError::TransferCanceledByPeer | EventManagerError::TransferCanceledByUs => {
            FileshareErrorCode::TransferInvalidated
        }
        EventManagerError::AcceptDirNotFound => FileshareErrorCode::AcceptDirNotFound,
        EventManagerError::AcceptDirIsASymlink => FileshareErrorCode::AcceptDirIsASymlink,
        EventManagerError::AcceptDirIsNotADirectory => FileshareErrorCode::AcceptDirIsNotADirectory,
        EventManagerError::NoPermissionsToAcceptDirectory => {
            FileshareErrorCode::AcceptDirNoPermissions
        }
        EventManagerError::SizeLimitExceeded => FileshareErrorCode::NotEnoughSpace,
        _ => FileshareErrorCode::LibFailure,
    }
}

/// Forward progress of one transfer until it reaches a terminal status
fn relay_progress(transfer_id: String, mut progress: ProgressReceiver, tx: mpsc::Sender<StatusResponse>) {
    tokio::spawn(async move {
        while let Some(update) = progress.recv().await {
            let terminal = update.status.is_terminal();
            if !terminal && update.status != Status::Ongoing {
                continue;
            }

            let response =
                StatusResponse::status(update.transfer_id, update.status, update.transferred);
            if tx.send(response).await.is_err() {
                debug!(%transfer_id, "Status stream closed by the caller");
                return;
            }
            if terminal {
                return;
            }
        }
    });
}

/// Request/response contract of the fileshare daemon.
///
/// Transport agnostic, the HTTP adapter in `api` is one caller. Every call first checks
/// that the mesh network is enabled.
pub struct TransferService {
    event_manager: Arc<EventManager>,
    fileshare: Arc<dyn Fileshare>,
    peers: Arc<dyn PeerResolver>,
    filesystem: Arc<dyn Filesystem>,
    notifier_factory: NotifierFactory,
    limits: ServiceLimits,
    shutdown: watch::Sender<bool>,
}

impl TransferService {
    pub fn new(
        event_manager: Arc<EventManager>,
        fileshare: Arc<dyn Fileshare>,
        peers: Arc<dyn PeerResolver>,
        filesystem: Arc<dyn Filesystem>,
        notifier_factory: NotifierFactory,
        limits: ServiceLimits,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            event_manager,
            fileshare,
            peers,
            filesystem,
            notifier_factory,
            limits,
            shutdown,
        }
    }

    pub fn event_manager(&self) -> &Arc<EventManager> {
        &self.event_manager
    }

    /// Flips to `true` once `stop` was called
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    fn check_mesh(&self) -> ServiceResult<()> {
        match self.peers.is_enabled() {
            Ok(true) => Ok(()),
            Ok(false) => Err(ServiceErrorCode::MeshNotEnabled.into()),
            Err(e) => {
                warn!(error = %e, "Failed to check mesh state");
                Err(ServiceErrorCode::MeshNotEnabled.into())
            }
        }
    }

    fn get_peers(&self) -> ServiceResult<std::collections::HashMap<String, Peer>> {
        self.peers.get_peers().map(peer_lookup).map_err(|e| {
            error!(error = %e, "Failed to get peers from mesh service");
            ServiceErrorCode::InternalFailure.into()
        })
    }

    pub fn ping(&self) {}

    /// Cancel every live transfer and let the daemon shut down
    pub fn stop(&self) {
        info!("Stopping fileshare service");
        self.event_manager.cancel_live_transfers();
        self.shutdown.send_replace(true);
    }

    fn count_files(&self, path: &Path, depth: usize) -> Result<usize, CountError> {
        if depth == 0 {
            return Err(CountError::TooDeep);
        }

        let mut count = 0;
        for entry in self.filesystem.read_dir(path)? {
            if entry.is_dir {
                count += self.count_files(&path.join(&entry.name), depth - 1)?;
            } else {
                count += 1;
            }
        }
        Ok(count)
    }

    fn validate_paths(&self, paths: &[String]) -> ServiceResult<()> {
        let mut file_count = 0;
        for path in paths {
            let path = Path::new(path);
            let info = self
                .filesystem
                .stat(path)
                .map_err(|_| FileshareErrorCode::FileNotFound)?;

            if info.is_dir {
                file_count += match self.count_files(path, self.limits.dir_depth_limit) {
                    Ok(count) => count,
                    Err(CountError::TooDeep) => return Err(FileshareErrorCode::DirectoryTooDeep.into()),
                    Err(CountError::Io(e)) => {
                        warn!(path = %path.display(), error = %e, "Failed to read directory");
                        return Err(FileshareErrorCode::FileNotFound.into());
                    }
                };
            } else {
                file_count += 1;
            }

            if file_count > self.limits.transfer_file_limit {
                return Err(FileshareErrorCode::TooManyFiles.into());
            }
            if file_count == 0 {
                return Err(FileshareErrorCode::NoFiles.into());
            }
        }

        if file_count == 0 {
            return Err(FileshareErrorCode::NoFiles.into());
        }
        Ok(())
    }

    fn start_send(&self, req: &SendRequest) -> ServiceResult<(String, Option<ProgressReceiver>)> {
        self.check_mesh()?;
        self.validate_paths(&req.paths)?;

        let peers = self.get_peers()?;
        let peer = peers
            .get(&req.peer)
            .ok_or(FileshareErrorCode::InvalidPeer)?;
        if peer.status == PeerStatus::Disconnected {
            return Err(FileshareErrorCode::PeerDisconnected.into());
        }
        let ip: IpAddr = peer
            .ip
            .parse()
            .map_err(|_| FileshareErrorCode::InvalidPeer)?;
        if !peer.is_fileshare_allowed {
            return Err(FileshareErrorCode::SendingNotAllowed.into());
        }

        let transfer_id = self.fileshare.send(ip, &req.paths).map_err(|e| {
            warn!(peer = %peer.ip, error = %e, "Engine refused to create transfer");
            FileshareErrorCode::TransferNotCreated
        })?;

        let path = match req.paths.as_slice() {
            [single] => single.as_str(),
            _ => MULTIPLE_FILES_PATH,
        };
        self.event_manager
            .new_outgoing_transfer(&transfer_id, &peer.ip, path);
        let progress = (!req.silent).then(|| self.event_manager.subscribe(&transfer_id));

        let notification = NewTransferNotification {
            identifier: peer.identifier.clone(),
            os: peer.os.clone(),
            file_name: if req.paths.len() == 1 {
                req.paths[0].clone()
            } else {
                String::new()
            },
            file_count: req.paths.len(),
        };
        let resolver = self.peers.clone();
        tokio::task::spawn_blocking(move || {
            if let Err(e) = resolver.notify_new_transfer(notification) {
                debug!(error = %e, "Failed to notify peer about new transfer");
            }
        });

        info!(%transfer_id, peer = %peer.ip, paths = req.paths.len(), "Transfer sent");
        Ok((transfer_id, progress))
    }

    /// Offer files to a peer. The stream starts with `Requested` and, unless silent,
    /// follows the transfer to its end.
    pub fn send(&self, req: SendRequest) -> StatusStream {
        match self.start_send(&req) {
            Ok((transfer_id, progress)) => self.stream(transfer_id, progress),
            Err(e) => single(StatusResponse::error(e)),
        }
    }

    fn start_accept(&self, req: &AcceptRequest) -> ServiceResult<Option<ProgressReceiver>> {
        self.check_mesh()?;

        let transfer = self
            .event_manager
            .accept_transfer(&req.transfer_id, &req.dst_path, &req.files)
            .map_err(|e| {
                let code = accept_error_code(&e);
                if code == FileshareErrorCode::LibFailure {
                    error!(transfer_id = %req.transfer_id, error = %e, "Failed to accept transfer");
                }
                code
            })?;

        let progress = (!req.silent).then(|| self.event_manager.subscribe(&transfer.id));

        // Files left out are canceled before any download starts, so the last accepted
        // file to finish is the one that finalizes the transfer
        let (selected, unselected): (Vec<&File>, Vec<&File>) = transfer
            .files
            .iter()
            .partition(|file| is_file_selected(file, &req.files));
        let unselected: Vec<String> = unselected.into_iter().map(|f| f.id.clone()).collect();

        self.event_manager.cancel_files(&transfer.id, &unselected);
        for file_id in &unselected {
            if let Err(e) = self.fileshare.reject_file(&transfer.id, file_id) {
                debug!(transfer_id = %transfer.id, %file_id, error = %e, "Failed to reject unselected file");
            }
        }

        let mut started = false;
        for file in selected {
            match self.fileshare.accept(&transfer.id, &req.dst_path, &file.id) {
                Ok(()) => started = true,
                Err(e) => warn!(transfer_id = %transfer.id, file_id = %file.id, error = %e, "Failed to accept file"),
            }
        }

        if !started {
            self.event_manager.fail_accept(&transfer.id);
            return Err(FileshareErrorCode::AcceptAllFilesFailed.into());
        }
        Ok(progress)
    }

    /// Download files of an incoming transfer into `dst_path`
    pub fn accept(&self, req: AcceptRequest) -> StatusStream {
        match self.start_accept(&req) {
            Ok(progress) => self.stream(req.transfer_id, progress),
            Err(e) => single(StatusResponse::error(e)),
        }
    }

    fn stream(&self, transfer_id: String, progress: Option<ProgressReceiver>) -> StatusStream {
        let (tx, rx) = mpsc::channel(STATUS_STREAM_BUFFER);
        let _ = tx.try_send(StatusResponse::status(&transfer_id, Status::Requested, 0));
        if let Some(progress) = progress {
            relay_progress(transfer_id, progress, tx);
        }
        rx
    }

    pub fn cancel(&self, transfer_id: &str) -> ServiceResult<()> {
        self.check_mesh()?;

        let transfer = self.event_manager.get_transfer(transfer_id).map_err(|e| match e {
            EventManagerError::TransferNotFound(_) => FileshareErrorCode::TransferNotFound,
            e => {
                error!(transfer_id, error = %e, "Failed to look up transfer");
                FileshareErrorCode::LibFailure
            }
        })?;
        if !transfer.status.is_active() {
            return Err(FileshareErrorCode::TransferInvalidated.into());
        }

        self.fileshare.finalize(transfer_id).map_err(|e| {
            warn!(transfer_id, error = %e, "Failed to cancel transfer");
            FileshareErrorCode::LibFailure
        })?;
        Ok(())
    }

    /// Cancel one file, `file_id` may also be the file's display path
    pub fn cancel_file(&self, transfer_id: &str, file_id: &str) -> ServiceResult<()> {
        self.check_mesh()?;

        let transfer = self.event_manager.get_transfer(transfer_id).map_err(|e| match e {
            EventManagerError::TransferNotFound(_) => FileshareErrorCode::TransferNotFound,
            e => {
                error!(transfer_id, error = %e, "Failed to look up transfer");
                FileshareErrorCode::LibFailure
            }
        })?;
        let file = transfer
            .find_file_by_id_or_path(file_id)
            .ok_or(FileshareErrorCode::FileNotFound)?;

        match file.status {
            Status::Canceled => return Err(FileshareErrorCode::FileInvalidated.into()),
            Status::Ongoing => {}
            _ => return Err(FileshareErrorCode::FileNotInProgress.into()),
        }

        self.fileshare.reject_file(transfer_id, &file.id).map_err(|e| {
            warn!(transfer_id, file_id = %file.id, error = %e, "Failed to cancel file");
            FileshareErrorCode::LibFailure
        })?;
        Ok(())
    }

    /// Every known transfer with peers shown by hostname, in chunks of `list_chunk_size`
    pub fn list(&self) -> Vec<ListResponse> {
        let result = self.check_mesh().and_then(|_| self.get_peers());
        let peers = match result {
            Ok(peers) => peers,
            Err(e) => {
                return vec![ListResponse {
                    error: Some(e),
                    transfers: vec![],
                }]
            }
        };

        let mut transfers = self.event_manager.get_transfers();
        for transfer in &mut transfers {
            if let Some(peer) = peers.get(&transfer.peer) {
                transfer.peer = peer.hostname.clone();
            }
        }

        if transfers.is_empty() {
            return vec![ListResponse {
                error: None,
                transfers,
            }];
        }
        transfers
            .chunks(self.limits.list_chunk_size.max(1))
            .map(|chunk| ListResponse {
                error: None,
                transfers: chunk.to_vec(),
            })
            .collect()
    }

    pub fn set_notifications(&self, enable: bool) -> SetNotificationsStatus {
        if self.event_manager.are_notifications_enabled() == enable {
            return SetNotificationsStatus::NothingToDo;
        }

        let result = if enable {
            let notifier = match (self.notifier_factory)() {
                Ok(notifier) => notifier,
                Err(e) => {
                    error!(error = %e, "Failed to create notifier");
                    return SetNotificationsStatus::SetFailure;
                }
            };
            self.event_manager.enable_notifications(notifier)
        } else {
            self.event_manager.disable_notifications()
        };

        match result {
            Ok(()) => SetNotificationsStatus::SetSuccess,
            Err(
                EventManagerError::NotificationsAlreadyEnabled
                | EventManagerError::NotificationsAlreadyDisabled,
            ) => SetNotificationsStatus::NothingToDo,
            Err(e) => {
                error!(error = %e, "Failed to toggle notifications");
                SetNotificationsStatus::SetFailure
            }
        }
    }

    pub fn purge_transfers_until(&self, until: DateTime<Utc>) -> ServiceResult<()> {
        self.check_mesh()?;
        self.event_manager.purge_transfers_until(until).map_err(|e| {
            error!(%until, error = %e, "Failed to purge transfers");
            ServiceError::from(FileshareErrorCode::PurgeFailure)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineEvent;
    use crate::engine::{QueuedFile, ReceivedFile};
    use crate::mesh::StaticPeerResolver;
    use crate::system::DirEntry;
    use crate::testing::{
        EngineCall, FakeFileshare, FakeFilesystem, FakeOsInfo, MemoryStorage, RecordingNotifier,
    };
    use crate::transfer::Direction;
    use std::path::PathBuf;

    const PEER_IP: &str = "172.20.0.5";
    const DOWNLOADS: &str = "/home/user/Downloads";

    struct Harness {
        service: TransferService,
        fileshare: Arc<FakeFileshare>,
        filesystem: Arc<FakeFilesystem>,
        peers: Arc<StaticPeerResolver>,
    }

    fn peer() -> Peer {
        Peer {
            ip: PEER_IP.into(),
            hostname: "laptop.nord".into(),
            pubkey: "cGVlcg==".into(),
            status: PeerStatus::Connected,
            is_fileshare_allowed: true,
            do_i_allow_fileshare: true,
            ..Default::default()
        }
    }

    fn harness_with(mesh_enabled: bool, peers: Vec<Peer>, limits: ServiceLimits) -> Harness {
        let fileshare = Arc::new(FakeFileshare::default());
        let filesystem = Arc::new(FakeFilesystem::dir(DOWNLOADS));
        let peers = Arc::new(StaticPeerResolver::new(mesh_enabled, peers));

        let event_manager = Arc::new(EventManager::new(
            Arc::new(MemoryStorage::default()),
            peers.clone(),
            filesystem.clone(),
            Arc::new(FakeOsInfo),
            Some(PathBuf::from(DOWNLOADS)),
        ));
        event_manager.set_fileshare(fileshare.clone());

        let service = TransferService::new(
            event_manager,
            fileshare.clone(),
            peers.clone(),
            filesystem.clone(),
            Box::new(|| -> NotifyResult<Box<dyn Notifier>> {
                Ok(Box::new(RecordingNotifier::default()))
            }),
            limits,
        );

        Harness {
            service,
            fileshare,
            filesystem,
            peers,
        }
    }

    fn harness() -> Harness {
        harness_with(true, vec![peer()], ServiceLimits::default())
    }

    fn send_request(peer: &str, paths: &[&str]) -> SendRequest {
        SendRequest {
            peer: peer.into(),
            paths: paths.iter().map(|p| p.to_string()).collect(),
            silent: false,
        }
    }

    async fn first_error(mut stream: StatusStream) -> Option<ServiceError> {
        stream.recv().await.and_then(|r| r.error)
    }

    fn incoming(h: &Harness, transfer_id: &str, files: &[(&str, u64)]) {
        h.service.event_manager().on_event(EngineEvent::RequestReceived {
            transfer_id: transfer_id.into(),
            peer: PEER_IP.into(),
            files: files
                .iter()
                .map(|(id, size)| ReceivedFile {
                    id: id.to_string(),
                    path: id.to_string(),
                    size: *size,
                })
                .collect(),
        });
    }

    #[tokio::test]
    async fn test_mesh_disabled() {
        let h = harness_with(false, vec![peer()], ServiceLimits::default());
        let mesh_disabled = Some(ServiceError::Service(ServiceErrorCode::MeshNotEnabled));

        h.filesystem.add_file("/tmp/a");
        assert_eq!(first_error(h.service.send(send_request(PEER_IP, &["/tmp/a"]))).await, mesh_disabled);
        assert_eq!(h.service.cancel("t1").err(), mesh_disabled);
        assert_eq!(h.service.list()[0].error, mesh_disabled);
        assert!(h.fileshare.calls().is_empty());
    }

    #[tokio::test]
    async fn test_send_validation() {
        let limits = ServiceLimits {
            dir_depth_limit: 2,
            transfer_file_limit: 3,
            list_chunk_size: 100,
        };
        let mut disconnected = peer();
        disconnected.ip = "172.20.0.6".into();
        disconnected.hostname = "offline.nord".into();
        disconnected.pubkey = "b2ZmbGluZQ==".into();
        disconnected.status = PeerStatus::Disconnected;
        let mut not_allowed = peer();
        not_allowed.ip = "172.20.0.7".into();
        not_allowed.hostname = "strict.nord".into();
        not_allowed.pubkey = "c3RyaWN0".into();
        not_allowed.is_fileshare_allowed = false;

        let h = harness_with(true, vec![peer(), disconnected, not_allowed], limits);
        h.filesystem.add_file("/tmp/a");
        h.filesystem.add_dir("/tmp/empty");
        h.filesystem.set_children("/tmp/empty", vec![]);
        h.filesystem.add_dir("/tmp/deep");
        h.filesystem.set_children(
            "/tmp/deep",
            vec![DirEntry {
                name: "one".into(),
                is_dir: true,
            }],
        );
        h.filesystem.set_children(
            "/tmp/deep/one",
            vec![DirEntry {
                name: "two".into(),
                is_dir: true,
            }],
        );
        h.filesystem.set_children("/tmp/deep/one/two", vec![]);
        // Listed as a directory, but its entries cannot be read
        h.filesystem.add_dir("/tmp/unreadable");
        h.filesystem.add_dir("/tmp/many");
        h.filesystem.set_children(
            "/tmp/many",
            (0..4)
                .map(|i| DirEntry {
                    name: format!("f{i}"),
                    is_dir: false,
                })
                .collect(),
        );

        let cases = [
            (send_request(PEER_IP, &["/tmp/missing"]), FileshareErrorCode::FileNotFound),
            (send_request(PEER_IP, &["/tmp/unreadable"]), FileshareErrorCode::FileNotFound),
            (send_request(PEER_IP, &["/tmp/deep"]), FileshareErrorCode::DirectoryTooDeep),
            (send_request(PEER_IP, &["/tmp/many"]), FileshareErrorCode::TooManyFiles),
            (send_request(PEER_IP, &["/tmp/empty"]), FileshareErrorCode::NoFiles),
            (send_request("nobody", &["/tmp/a"]), FileshareErrorCode::InvalidPeer),
            (send_request("offline.nord", &["/tmp/a"]), FileshareErrorCode::PeerDisconnected),
            (send_request("c3RyaWN0", &["/tmp/a"]), FileshareErrorCode::SendingNotAllowed),
        ];
        for (request, code) in cases {
            assert_eq!(
                first_error(h.service.send(request.clone())).await,
                Some(ServiceError::Fileshare(code)),
                "{request:?}"
            );
        }
        assert!(h.fileshare.calls().is_empty());

        *h.fileshare.fail_send.lock() = true;
        assert_eq!(
            first_error(h.service.send(send_request(PEER_IP, &["/tmp/a"]))).await,
            Some(ServiceError::Fileshare(FileshareErrorCode::TransferNotCreated))
        );
    }

    #[tokio::test]
    async fn test_send_streams_progress() {
        let h = harness();
        h.filesystem.add_file("/tmp/a");

        let mut stream = h.service.send(send_request("laptop.nord", &["/tmp/a"]));
        let first = stream.recv().await.unwrap();
        assert_eq!(first.status, Status::Requested);
        assert_eq!(first.error, None);
        let transfer_id = first.transfer_id;

        assert_eq!(
            h.fileshare.calls(),
            vec![EngineCall::Send(PEER_IP.parse().unwrap(), vec!["/tmp/a".into()])]
        );

        let manager = h.service.event_manager();
        let transfer = manager.get_transfer(&transfer_id).unwrap();
        assert_eq!(transfer.direction, Direction::Outgoing);
        assert_eq!(transfer.path, "/tmp/a");

        manager.on_event(EngineEvent::RequestQueued {
            transfer_id: transfer_id.clone(),
            peer: PEER_IP.into(),
            files: vec![QueuedFile {
                id: "a".into(),
                path: "a".into(),
                size: 10,
                base_dir: Some("/tmp".into()),
            }],
        });
        manager.on_event(EngineEvent::FileProgress {
            transfer_id: transfer_id.clone(),
            file_id: "a".into(),
            transferred: 5,
        });
        manager.on_event(EngineEvent::FileUploaded {
            transfer_id: transfer_id.clone(),
            file_id: "a".into(),
        });

        let ongoing = stream.recv().await.unwrap();
        assert_eq!((ongoing.status, ongoing.progress), (Status::Ongoing, 50));
        assert_eq!(stream.recv().await.unwrap().status, Status::Success);
        assert!(stream.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_silent_send_ends_after_requested() {
        let h = harness();
        h.filesystem.add_file("/tmp/a");
        let mut request = send_request(PEER_IP, &["/tmp/a"]);
        request.silent = true;

        let mut stream = h.service.send(request);
        assert_eq!(stream.recv().await.unwrap().status, Status::Requested);
        assert!(stream.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_accept_subset_cancels_the_rest() {
        let h = harness();
        incoming(
            &h,
            "t1",
            &[("nested/a", 1), ("nested/inner/b", 1), ("outer/c", 1), ("outer/d", 1)],
        );

        let mut stream = h.service.accept(AcceptRequest {
            transfer_id: "t1".into(),
            dst_path: DOWNLOADS.into(),
            files: vec!["nested".into()],
            silent: true,
        });
        assert_eq!(stream.recv().await.unwrap().status, Status::Requested);

        let calls = h.fileshare.calls();
        assert_eq!(
            calls,
            vec![
                EngineCall::RejectFile("t1".into(), "outer/c".into()),
                EngineCall::RejectFile("t1".into(), "outer/d".into()),
                EngineCall::Accept("t1".into(), DOWNLOADS.into(), "nested/a".into()),
                EngineCall::Accept("t1".into(), DOWNLOADS.into(), "nested/inner/b".into()),
            ]
        );

        let transfer = h.service.event_manager().get_transfer("t1").unwrap();
        let canceled: Vec<&str> = transfer
            .files
            .iter()
            .filter(|f| f.status == Status::Canceled)
            .map(|f| f.id.as_str())
            .collect();
        assert_eq!(canceled, vec!["outer/c", "outer/d"]);
        assert_eq!(transfer.total_size, 2);
    }

    #[tokio::test]
    async fn test_accept_subset_finalizes_after_last_selected_file() {
        let h = harness();
        incoming(&h, "t1", &[("nested/a", 10), ("outer/c", 10)]);

        let mut stream = h.service.accept(AcceptRequest {
            transfer_id: "t1".into(),
            dst_path: DOWNLOADS.into(),
            files: vec!["nested".into()],
            silent: false,
        });
        assert_eq!(stream.recv().await.unwrap().status, Status::Requested);

        let event_manager = h.service.event_manager();
        event_manager.on_event(EngineEvent::FileDownloaded {
            transfer_id: "t1".into(),
            file_id: "nested/a".into(),
            final_path: format!("{DOWNLOADS}/nested/a"),
        });
        assert!(h.fileshare.calls().contains(&EngineCall::Finalize("t1".into())));

        // Echo of the rejection issued for the unselected file
        event_manager.on_event(EngineEvent::FileRejected {
            transfer_id: "t1".into(),
            file_id: "outer/c".into(),
            by_peer: false,
        });
        event_manager.on_event(EngineEvent::TransferFinalized {
            transfer_id: "t1".into(),
            by_peer: false,
        });

        let mut updates = Vec::new();
        while let Some(update) = stream.recv().await {
            updates.push(update);
        }
        assert_eq!(updates.last().unwrap().status, Status::Success);
    }

    #[tokio::test]
    async fn test_accept_errors() {
        let h = harness();
        incoming(&h, "t1", &[("a", 1)]);

        let accept = |transfer_id: &str, dst_path: &str| AcceptRequest {
            transfer_id: transfer_id.into(),
            dst_path: dst_path.into(),
            files: vec![],
            silent: true,
        };

        assert_eq!(
            first_error(h.service.accept(accept("nope", DOWNLOADS))).await,
            Some(ServiceError::Fileshare(FileshareErrorCode::TransferNotFound))
        );
        assert_eq!(
            first_error(h.service.accept(accept("t1", "/missing"))).await,
            Some(ServiceError::Fileshare(FileshareErrorCode::AcceptDirNotFound))
        );

        *h.fileshare.fail_accept.lock() = true;
        assert_eq!(
            first_error(h.service.accept(accept("t1", DOWNLOADS))).await,
            Some(ServiceError::Fileshare(FileshareErrorCode::AcceptAllFilesFailed))
        );
        assert_eq!(
            h.service.event_manager().get_transfer("t1").unwrap().status,
            Status::AcceptFailure
        );
        assert_eq!(
            first_error(h.service.accept(accept("t1", DOWNLOADS))).await,
            Some(ServiceError::Fileshare(FileshareErrorCode::AlreadyAccepted))
        );
    }

    #[tokio::test]
    async fn test_cancel() {
        let h = harness();
        incoming(&h, "t1", &[("a", 1)]);

        assert_eq!(
            h.service.cancel("missing"),
            Err(ServiceError::Fileshare(FileshareErrorCode::TransferNotFound))
        );
        assert_eq!(h.service.cancel("t1"), Ok(()));
        assert_eq!(h.fileshare.calls(), vec![EngineCall::Finalize("t1".into())]);

        h.service.event_manager().on_event(EngineEvent::TransferFinalized {
            transfer_id: "t1".into(),
            by_peer: false,
        });
        assert_eq!(
            h.service.cancel("t1"),
            Err(ServiceError::Fileshare(FileshareErrorCode::TransferInvalidated))
        );
    }

    #[tokio::test]
    async fn test_cancel_file() {
        let h = harness();
        incoming(&h, "t1", &[("a", 10), ("b", 10), ("c", 10)]);
        let manager = h.service.event_manager();
        manager.accept_transfer("t1", DOWNLOADS, &[]).unwrap();
        manager.on_event(EngineEvent::FileProgress {
            transfer_id: "t1".into(),
            file_id: "a".into(),
            transferred: 1,
        });
        manager.on_event(EngineEvent::FileRejected {
            transfer_id: "t1".into(),
            file_id: "b".into(),
            by_peer: false,
        });

        assert_eq!(
            h.service.cancel_file("t1", "zzz"),
            Err(ServiceError::Fileshare(FileshareErrorCode::FileNotFound))
        );
        assert_eq!(
            h.service.cancel_file("t1", "b"),
            Err(ServiceError::Fileshare(FileshareErrorCode::FileInvalidated))
        );
        assert_eq!(
            h.service.cancel_file("t1", "c"),
            Err(ServiceError::Fileshare(FileshareErrorCode::FileNotInProgress))
        );
        assert_eq!(h.service.cancel_file("t1", "a"), Ok(()));
        assert_eq!(
            h.fileshare.calls(),
            vec![EngineCall::RejectFile("t1".into(), "a".into())]
        );
    }

    #[tokio::test]
    async fn test_list_uses_hostnames_and_chunks() {
        let limits = ServiceLimits {
            list_chunk_size: 2,
            ..ServiceLimits::default()
        };
        let h = harness_with(true, vec![peer()], limits);
        for id in ["t1", "t2", "t3"] {
            incoming(&h, id, &[("a", 1)]);
        }

        let chunks = h.service.list();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].transfers.len(), 2);
        assert_eq!(chunks[1].transfers.len(), 1);
        assert!(chunks
            .iter()
            .flat_map(|c| &c.transfers)
            .all(|t| t.peer == "laptop.nord"));

        h.peers.set_peers(vec![]);
        assert_eq!(h.service.list()[0].transfers[0].peer, PEER_IP);
    }

    #[tokio::test]
    async fn test_set_notifications() {
        let h = harness();
        assert_eq!(h.service.set_notifications(false), SetNotificationsStatus::NothingToDo);
        assert_eq!(h.service.set_notifications(true), SetNotificationsStatus::SetSuccess);
        assert_eq!(h.service.set_notifications(true), SetNotificationsStatus::NothingToDo);
        assert_eq!(h.service.set_notifications(false), SetNotificationsStatus::SetSuccess);
    }

    #[tokio::test]
    async fn test_stop_cancels_and_signals() {
        let h = harness();
        incoming(&h, "t1", &[("a", 1)]);
        let shutdown = h.service.shutdown_signal();

        h.service.stop();

        assert!(*shutdown.borrow());
        assert_eq!(
            h.service.event_manager().get_transfer("t1").unwrap().status,
            Status::Canceled
        );
    }

    #[tokio::test]
    async fn test_purge() {
        let h = harness();
        h.service.ping();
        assert_eq!(h.service.purge_transfers_until(Utc::now()), Ok(()));
    }
}
