//! SmartBin pipelines
//!
//! A SmartBin wraps one source in a top-level pipeline and keeps a stable
//! fan-out junction per media kind between that source and its consumers.
//! Preview sinks plug into the junctions; `record()` temporarily adds an
//! encode chain beside them and `stop_recording()` takes it out again.
//!
//! Every topology mutation, pad notifications from the source included,
//! runs under one lock.

use super::encode::EncodeChain;
use super::error::{PipelineError, PipelineResult};
use super::guard::{Mutation, TopologyGuard};
use super::junction::FanOutJunction;
use super::sink::{SinkChain, SinkSlot};
use super::source::{
    file_stream, SourceVariant, StreamInfo, StreamLayout, DEFAULT_HEIGHT, DEFAULT_WIDTH,
    TEST_AUDIO_WAVE, TEST_VIDEO_PATTERN,
};
use crate::graph::{
    ElementId, HandlerId, MediaGraph, MediaKind, PadEvent, PadEventHandler, PropertyValue, State,
};
use crate::project::{ExportSettings, Project, SourceFactory};
use parking_lot::{Mutex, RwLock};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

/// Everything the topology lock protects
struct Topology {
    audio_tee: Option<FanOutJunction>,
    video_tee: Option<FanOutJunction>,
    audio_slot: SinkSlot,
    video_slot: SinkSlot,
    encoder: Option<EncodeChain>,
    /// Preview audio sink set aside while recording
    parked_audio: Option<SinkChain>,
}

impl Topology {
    fn new(audio_tee: Option<FanOutJunction>, video_tee: Option<FanOutJunction>) -> Self {
        Self {
            audio_tee,
            video_tee,
            audio_slot: SinkSlot::new(MediaKind::Audio),
            video_slot: SinkSlot::new(MediaKind::Video),
            encoder: None,
            parked_audio: None,
        }
    }

    fn junction(&self, kind: MediaKind) -> Option<&FanOutJunction> {
        match kind {
            MediaKind::Audio => self.audio_tee.as_ref(),
            MediaKind::Video => self.video_tee.as_ref(),
        }
    }

    fn slot(&self, kind: MediaKind) -> &SinkSlot {
        match kind {
            MediaKind::Audio => &self.audio_slot,
            MediaKind::Video => &self.video_slot,
        }
    }

    fn slot_and_junction(&mut self, kind: MediaKind) -> (&mut SinkSlot, Option<&FanOutJunction>) {
        match kind {
            MediaKind::Audio => (&mut self.audio_slot, self.audio_tee.as_ref()),
            MediaKind::Video => (&mut self.video_slot, self.video_tee.as_ref()),
        }
    }
}

/// Reusable playback / render pipeline around a single source
pub struct SmartBin {
    name: String,
    display_name: String,
    graph: Arc<dyn MediaGraph>,
    pipeline: ElementId,
    layout: StreamLayout,
    variant: SourceVariant,
    topology: Mutex<Topology>,
    info: RwLock<StreamInfo>,
    /// Pad event registration on the source, dropped with the pipeline
    pad_listener: Mutex<Option<(ElementId, HandlerId)>>,
}

impl SmartBin {
    // ── Construction ────────────────────────────────────────────────────────

    /// Pipeline decoding the file behind `factory`
    pub fn for_file(graph: Arc<dyn MediaGraph>, factory: Arc<dyn SourceFactory>) -> PipelineResult<Arc<Self>> {
        let name = format!("smartfilebin-{}", factory.name());
        let (layout, info) = file_stream(factory.as_ref());
        let (pipeline, topology) = skeleton(graph.as_ref(), &name, layout)?;

        let source = match factory.make_bin(graph.as_ref()) {
            Ok(source) => source,
            Err(e) => {
                discard(graph.as_ref(), pipeline);
                return Err(PipelineError::construction(e));
            }
        };
        if let Err(e) = graph.add(pipeline, source) {
            if let Err(dispose) = graph.dispose(source) {
                tracing::warn!("Failed to dispose source {}: {}", source, dispose);
            }
            factory.bin_is_destroyed(source);
            discard(graph.as_ref(), pipeline);
            return Err(PipelineError::construction(e));
        }

        let display_name = factory.display_name().to_string();
        let bin = Arc::new(Self {
            name,
            display_name,
            graph,
            pipeline,
            layout,
            variant: SourceVariant::File { factory, source },
            topology: Mutex::new(topology),
            info: RwLock::new(info),
            pad_listener: Mutex::new(None),
        });
        bin.listen_for_pads(source)?;

        tracing::info!(
            "Created {} ({}x{}, length {}, audio: {}, video: {})",
            bin.name,
            info.width,
            info.height,
            info.length,
            layout.has_audio,
            layout.has_video
        );
        Ok(bin)
    }

    /// Pipeline rendering the timeline of `project`
    pub fn for_timeline(graph: Arc<dyn MediaGraph>, project: Arc<Project>) -> PipelineResult<Arc<Self>> {
        let name = format!("project-{}", project.name());
        let layout = StreamLayout::BOTH;
        // Subscribed before the snapshot so no change falls in between
        let variant = SourceVariant::timeline(project.clone());
        let (width, height) = project.settings().snapshot().geometry();
        let info = StreamInfo {
            length: project.timeline().duration(),
            width,
            height,
        };
        let (pipeline, topology) = skeleton(graph.as_ref(), &name, layout)?;

        let composition = project.timeline().composition();
        if let Err(e) = graph.add(pipeline, composition) {
            discard(graph.as_ref(), pipeline);
            return Err(PipelineError::construction(e));
        }

        let display_name = format!("Project: {}", project.name());
        let bin = Arc::new(Self {
            name,
            display_name,
            graph,
            pipeline,
            layout,
            variant,
            topology: Mutex::new(topology),
            info: RwLock::new(info),
            pad_listener: Mutex::new(None),
        });
        bin.listen_for_pads(composition)?;

        tracing::info!("Created {} ({}x{}, length {})", bin.name, width, height, info.length);
        Ok(bin)
    }

    /// Fallback pipeline fed by a test pattern and silence
    pub fn default_source(graph: Arc<dyn MediaGraph>) -> PipelineResult<Arc<Self>> {
        let name = "smartdefaultbin".to_string();
        let layout = StreamLayout::BOTH;
        let (pipeline, topology) = skeleton(graph.as_ref(), &name, layout)?;

        let (video, audio) = match link_test_sources(graph.as_ref(), pipeline, &topology) {
            Ok(sources) => sources,
            Err(e) => {
                discard(graph.as_ref(), pipeline);
                return Err(e);
            }
        };

        tracing::info!("Created {}", name);
        Ok(Arc::new(Self {
            display_name: name.clone(),
            name,
            graph,
            pipeline,
            layout,
            variant: SourceVariant::Synthetic { video, audio },
            topology: Mutex::new(topology),
            info: RwLock::new(StreamInfo {
                length: 0,
                width: DEFAULT_WIDTH,
                height: DEFAULT_HEIGHT,
            }),
            pad_listener: Mutex::new(None),
        }))
    }

    fn listen_for_pads(self: &Arc<Self>, source: ElementId) -> PipelineResult<()> {
        let bin = Arc::downgrade(self);
        let handler: PadEventHandler = Arc::new(move |event: PadEvent| {
            if let Some(bin) = bin.upgrade() {
                bin.handle_pad_event(event);
            }
        });
        let id = self
            .graph
            .connect_pad_events(source, handler)
            .map_err(PipelineError::construction)?;
        *self.pad_listener.lock() = Some((source, id));
        Ok(())
    }

    fn handle_pad_event(&self, event: PadEvent) {
        let graph = self.graph.as_ref();
        let topology = self.topology.lock();

        let (PadEvent::Added(pad) | PadEvent::Removed(pad)) = event;
        let Some(kind) = self.variant.binder().route(graph, pad) else {
            tracing::debug!("{}: ignoring source pad {}", self.name, pad);
            return;
        };
        let Some(junction) = topology.junction(kind) else {
            tracing::debug!("{}: no {} junction for {}", self.name, kind, pad);
            return;
        };

        match event {
            PadEvent::Added(_) => match junction.connect_source(graph, pad) {
                Ok(()) => tracing::debug!("{}: linked {} into {} junction", self.name, pad, kind),
                Err(e) => tracing::warn!("{}: could not link {}: {}", self.name, pad, e),
            },
            PadEvent::Removed(_) => {
                junction.disconnect_source(graph, pad);
                tracing::debug!("{}: unlinked {} from {} junction", self.name, pad, kind);
            }
        }
    }

    // ── Accessors ───────────────────────────────────────────────────────────

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn layout(&self) -> StreamLayout {
        self.layout
    }

    pub fn stream_info(&self) -> StreamInfo {
        *self.info.read()
    }

    pub fn length(&self) -> u64 {
        self.info.read().length
    }

    pub fn width(&self) -> u32 {
        self.info.read().width
    }

    pub fn height(&self) -> u32 {
        self.info.read().height
    }

    /// Top-level pipeline element
    pub fn pipeline(&self) -> ElementId {
        self.pipeline
    }

    /// Project behind a timeline pipeline
    pub fn project(&self) -> Option<&Arc<Project>> {
        self.variant.project()
    }

    /// Settings `record()` falls back on when called without any
    pub fn resolve_default_settings(&self) -> Option<ExportSettings> {
        self.variant.resolve_default_settings()
    }

    pub fn is_recording(&self) -> bool {
        self.topology.lock().encoder.is_some()
    }

    pub fn audio_sink(&self) -> Option<SinkChain> {
        self.topology.lock().slot(MediaKind::Audio).chain().cloned()
    }

    pub fn video_sink(&self) -> Option<SinkChain> {
        self.topology.lock().slot(MediaKind::Video).chain().cloned()
    }

    /// Innermost terminal element of the attached video sink
    pub fn real_video_sink(&self) -> Option<ElementId> {
        self.topology
            .lock()
            .slot(MediaKind::Video)
            .chain()
            .and_then(SinkChain::real_sink)
    }

    // ── State ───────────────────────────────────────────────────────────────

    /// Current pipeline state, queried without waiting
    pub fn state(&self) -> State {
        self.graph.state(self.pipeline).current
    }

    pub fn set_state(&self, state: State) -> PipelineResult<()> {
        let change = self.graph.set_state(self.pipeline, state);
        if change.is_failure() {
            tracing::warn!("{}: pipeline refused to go to {}", self.name, state);
            return Err(PipelineError::StateTransition(state));
        }
        tracing::debug!("{}: state {} ({:?})", self.name, state, change);
        Ok(())
    }

    // ── Sinks ───────────────────────────────────────────────────────────────

    pub fn set_audio_sink(&self, chain: SinkChain) -> PipelineResult<()> {
        let mut topology = self.topology.lock();
        self.attach_locked(&mut topology, MediaKind::Audio, chain)
    }

    pub fn set_video_sink(&self, chain: SinkChain) -> PipelineResult<()> {
        let mut topology = self.topology.lock();
        self.attach_locked(&mut topology, MediaKind::Video, chain)
    }

    pub fn remove_audio_sink(&self) -> PipelineResult<()> {
        let mut topology = self.topology.lock();
        self.detach_locked(&mut topology, MediaKind::Audio).map(|_| ())
    }

    pub fn remove_video_sink(&self) -> PipelineResult<()> {
        let mut topology = self.topology.lock();
        self.detach_locked(&mut topology, MediaKind::Video).map(|_| ())
    }

    fn attach_locked(&self, topology: &mut Topology, kind: MediaKind, chain: SinkChain) -> PipelineResult<()> {
        TopologyGuard::check(Mutation::AttachSink, self.state())?;
        if !self.layout.supports(kind) {
            return Err(PipelineError::Precondition(format!("{} has no {} stream", self.name, kind)));
        }
        let (slot, junction) = topology.slot_and_junction(kind);
        let junction = junction
            .ok_or_else(|| PipelineError::Precondition(format!("{} has no {} stream", self.name, kind)))?;

        let id = chain.id();
        slot.attach(self.graph.as_ref(), self.pipeline, junction, chain)?;
        tracing::info!("{}: {} sink set to {}", self.name, kind, id);
        Ok(())
    }

    fn detach_locked(&self, topology: &mut Topology, kind: MediaKind) -> PipelineResult<SinkChain> {
        TopologyGuard::check(Mutation::DetachSink, self.state())?;
        let (slot, junction) = topology.slot_and_junction(kind);
        let junction = junction
            .ok_or_else(|| PipelineError::Precondition(format!("{} has no {} stream", self.name, kind)))?;

        let chain = slot.detach(self.graph.as_ref(), self.pipeline, junction)?;
        tracing::info!("{}: {} sink {} removed", self.name, kind, chain.id());
        Ok(chain)
    }

    fn set_video_sync(&self, topology: &Topology, sync: bool) {
        let Some(sink) = topology.video_slot.chain().and_then(SinkChain::real_sink) else {
            tracing::debug!("{}: no real video sink to set sync={} on", self.name, sync);
            return;
        };
        match self.graph.set_property(sink, "sync", PropertyValue::Bool(sync)) {
            Ok(()) => tracing::debug!("{}: video sink sync={}", self.name, sync),
            Err(e) => tracing::warn!("{}: could not set sync on {}: {}", self.name, sink, e),
        }
    }

    // ── Recording ───────────────────────────────────────────────────────────

    /// Start writing the pipeline's output to `uri`.
    ///
    /// Without explicit `settings` the variant's default settings are used.
    /// The preview audio sink is set aside until `stop_recording()`. If any
    /// step fails the recording is torn down again before returning.
    pub fn record(&self, uri: &str, settings: Option<&ExportSettings>) -> PipelineResult<()> {
        let mut topology = self.topology.lock();
        if topology.encoder.is_some() {
            return Err(PipelineError::Precondition(format!("{} is already recording", self.name)));
        }

        let settings = match settings {
            Some(settings) => settings.clone(),
            None => self.resolve_default_settings().ok_or(PipelineError::NoSettings)?,
        };

        tracing::info!("{}: recording to {}", self.name, uri);
        self.set_state(State::Ready)?;

        if topology.audio_slot.is_attached() {
            let parked = self.detach_locked(&mut topology, MediaKind::Audio)?;
            topology.parked_audio = Some(parked);
        }

        if let Err(e) = self.start_encoding(&mut topology, uri, &settings) {
            tracing::warn!("{}: recording to {} failed: {}", self.name, uri, e);
            self.teardown_encoding(&mut topology);
            return Err(e);
        }
        Ok(())
    }

    fn start_encoding(&self, topology: &mut Topology, uri: &str, settings: &ExportSettings) -> PipelineResult<()> {
        let graph = self.graph.as_ref();
        let chain = EncodeChain::assemble(graph, uri, settings, self.layout)?;
        if let Err(e) = graph.add(self.pipeline, chain.bin()) {
            if let Err(dispose) = graph.dispose(chain.bin()) {
                tracing::warn!("Failed to dispose encode chain {}: {}", chain.bin(), dispose);
            }
            return Err(PipelineError::construction(e));
        }
        topology.encoder = Some(chain);

        // Encoding runs as fast as it can, not against the clock
        self.set_video_sync(topology, false);
        self.link_encoder(graph, topology)
    }

    fn link_encoder(&self, graph: &dyn MediaGraph, topology: &mut Topology) -> PipelineResult<()> {
        let Topology {
            audio_tee,
            video_tee,
            encoder,
            ..
        } = topology;
        if let Some(chain) = encoder.as_mut() {
            for junction in [video_tee.as_ref(), audio_tee.as_ref()].into_iter().flatten() {
                chain.connect(graph, junction)?;
            }
        }
        self.set_state(State::Playing)
    }

    /// Take the encode chain out and restore the preview audio sink.
    /// Missing pieces are skipped.
    fn teardown_encoding(&self, topology: &mut Topology) {
        let graph = self.graph.as_ref();

        if let Some(mut chain) = topology.encoder.take() {
            for kind in [MediaKind::Video, MediaKind::Audio] {
                chain.disconnect(graph, topology.junction(kind), kind);
            }
            if let Err(e) = graph.remove(self.pipeline, chain.bin()) {
                tracing::warn!("{}: could not remove encode chain: {}", self.name, e);
            }
            if let Err(e) = graph.dispose(chain.bin()) {
                tracing::warn!("{}: could not dispose encode chain: {}", self.name, e);
            }
            tracing::info!("{}: encode chain removed", self.name);
        }

        if let Some(parked) = topology.parked_audio.take() {
            if let Err(e) = self.attach_locked(topology, MediaKind::Audio, parked.clone()) {
                tracing::warn!("{}: could not restore audio sink {}: {}", self.name, parked.id(), e);
                topology.parked_audio = Some(parked);
            }
        }

        self.set_video_sync(topology, true);
    }

    /// Pause, remove the encode chain and put the preview audio sink back.
    ///
    /// If the pipeline refuses to pause nothing is taken apart and the
    /// recording keeps going.
    pub fn stop_recording(&self) -> PipelineResult<()> {
        let mut topology = self.topology.lock();
        self.set_state(State::Paused)?;
        self.teardown_encoding(&mut topology);
        Ok(())
    }

    // ── Notifications ───────────────────────────────────────────────────────

    fn apply_settings(&self, settings: &ExportSettings) {
        let (width, height) = settings.geometry();
        let mut info = self.info.write();
        info.width = width;
        info.height = height;
        tracing::debug!("{}: geometry now {}x{}", self.name, width, height);
    }

    fn apply_duration(&self, duration: u64) {
        self.info.write().length = duration;
        tracing::debug!("{}: length now {}", self.name, duration);
    }

    fn resync(&self) {
        if let Some(project) = self.variant.project() {
            self.apply_settings(&project.settings().snapshot());
            self.apply_duration(project.timeline().duration());
        }
    }

    /// Apply pending project notifications without blocking.
    ///
    /// Returns how many were applied; always zero for pipelines without a
    /// project.
    pub fn sync_notifications(&self) -> usize {
        let SourceVariant::Timeline {
            settings_rx,
            duration_rx,
            ..
        } = &self.variant
        else {
            return 0;
        };

        let mut applied = 0;
        let mut lagged = false;
        {
            let mut rx = settings_rx.lock();
            loop {
                match rx.try_recv() {
                    Ok(settings) => {
                        self.apply_settings(&settings);
                        applied += 1;
                    }
                    Err(TryRecvError::Lagged(skipped)) => {
                        tracing::warn!("{}: missed {} settings notifications", self.name, skipped);
                        lagged = true;
                    }
                    Err(TryRecvError::Empty | TryRecvError::Closed) => break,
                }
            }
        }
        {
            let mut rx = duration_rx.lock();
            loop {
                match rx.try_recv() {
                    Ok(changed) => {
                        self.apply_duration(changed.duration);
                        applied += 1;
                    }
                    Err(TryRecvError::Lagged(skipped)) => {
                        tracing::warn!("{}: missed {} duration notifications", self.name, skipped);
                        lagged = true;
                    }
                    Err(TryRecvError::Empty | TryRecvError::Closed) => break,
                }
            }
        }
        if lagged {
            self.resync();
        }
        applied
    }

    /// Future that follows the project's notifications as they arrive.
    ///
    /// It ends when the SmartBin is dropped (checked on each notification)
    /// or the project goes away. `None` for pipelines without a project.
    pub fn watch_notifications(self: &Arc<Self>) -> Option<impl Future<Output = ()> + Send + 'static> {
        let project = self.variant.project()?;
        let mut settings_rx = project.settings().subscribe();
        let mut duration_rx = project.timeline().subscribe();
        let bin = Arc::downgrade(self);

        Some(async move {
            loop {
                tokio::select! {
                    changed = settings_rx.recv() => {
                        let Some(bin) = bin.upgrade() else { break };
                        match changed {
                            Ok(settings) => bin.apply_settings(&settings),
                            Err(RecvError::Lagged(_)) => bin.resync(),
                            Err(RecvError::Closed) => break,
                        }
                    }
                    changed = duration_rx.recv() => {
                        let Some(bin) = bin.upgrade() else { break };
                        match changed {
                            Ok(changed) => bin.apply_duration(changed.duration),
                            Err(RecvError::Lagged(_)) => bin.resync(),
                            Err(RecvError::Closed) => break,
                        }
                    }
                }
            }
            tracing::debug!("Notification watcher stopped");
        })
    }
}

impl Drop for SmartBin {
    fn drop(&mut self) {
        let graph = self.graph.as_ref();
        if let Some((source, id)) = self.pad_listener.lock().take() {
            if let Err(e) = graph.disconnect_pad_events(source, id) {
                tracing::warn!("{}: could not disconnect from {}: {}", self.name, source, e);
            }
        }
        if graph.set_state(self.pipeline, State::Null).is_failure() {
            tracing::warn!("{}: pipeline refused to stop", self.name);
        }

        // The composition belongs to the project and outlives this pipeline
        if let SourceVariant::Timeline { project, .. } = &self.variant {
            let composition = project.timeline().composition();
            if let Err(e) = graph.remove(self.pipeline, composition) {
                tracing::warn!("{}: could not release composition: {}", self.name, e);
            }
        }

        discard(graph, self.pipeline);

        if let SourceVariant::File { factory, source } = &self.variant {
            factory.bin_is_destroyed(*source);
        }
        tracing::debug!("Destroyed {}", self.name);
    }
}

/// Pipeline element plus one junction per declared kind
fn skeleton(graph: &dyn MediaGraph, name: &str, layout: StreamLayout) -> PipelineResult<(ElementId, Topology)> {
    let pipeline = graph.make_pipeline(name).map_err(PipelineError::construction)?;
    match make_junctions(graph, pipeline, layout) {
        Ok((audio, video)) => Ok((pipeline, Topology::new(audio, video))),
        Err(e) => {
            discard(graph, pipeline);
            Err(e)
        }
    }
}

fn make_junctions(
    graph: &dyn MediaGraph,
    pipeline: ElementId,
    layout: StreamLayout,
) -> PipelineResult<(Option<FanOutJunction>, Option<FanOutJunction>)> {
    let audio = if layout.has_audio {
        Some(FanOutJunction::new(graph, pipeline, MediaKind::Audio)?)
    } else {
        None
    };
    let video = if layout.has_video {
        Some(FanOutJunction::new(graph, pipeline, MediaKind::Video)?)
    } else {
        None
    };
    Ok((audio, video))
}

/// videotestsrc → vtee, audiotestsrc → atee
fn link_test_sources(
    graph: &dyn MediaGraph,
    pipeline: ElementId,
    topology: &Topology,
) -> PipelineResult<(ElementId, ElementId)> {
    let mut sources = Vec::with_capacity(2);
    for (kind, factory, name, key, value) in [
        (MediaKind::Video, "videotestsrc", "vtestsrc", "pattern", TEST_VIDEO_PATTERN),
        (MediaKind::Audio, "audiotestsrc", "atestsrc", "wave", TEST_AUDIO_WAVE),
    ] {
        let source = graph.make_element(factory, name).map_err(PipelineError::construction)?;
        if let Err(e) = graph.add(pipeline, source) {
            if let Err(dispose) = graph.dispose(source) {
                tracing::warn!("Failed to dispose {}: {}", name, dispose);
            }
            return Err(PipelineError::construction(e));
        }
        graph
            .set_property(source, key, PropertyValue::Int(value))
            .map_err(PipelineError::construction)?;

        let pad = graph
            .static_pad(source, "src")
            .ok_or_else(|| PipelineError::Construction(format!("{} has no src pad", name)))?;
        let junction = topology
            .junction(kind)
            .ok_or_else(|| PipelineError::Construction(format!("no {} junction", kind)))?;
        junction.connect_source(graph, pad)?;
        sources.push(source);
    }
    Ok((sources[0], sources[1]))
}

fn discard(graph: &dyn MediaGraph, pipeline: ElementId) {
    if let Err(e) = graph.dispose(pipeline) {
        tracing::warn!("Failed to dispose pipeline {}: {}", pipeline, e);
    }
}
