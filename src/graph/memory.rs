//! In-process media graph
//!
//! `MemoryGraph` models the structural side of a media framework: element
//! factories with pad templates, bins, ghost and request pads, link rules,
//! pipeline state and dynamic pad notifications. No buffers flow through it.
//! It backs headless use of the pipeline core and all of its tests.

use super::error::{GraphError, GraphResult};
use super::traits::MediaGraph;
use super::types::{
    ElementId, HandlerId, PadDirection, PadEvent, PadEventHandler, PadId, PropertyValue, State, StateChange,
    StateSnapshot,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};

/// When a pad described by a template exists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Created with the element
    Always,
    /// Created on demand through `request_pad`
    Request,
    /// Appears at runtime (demuxers, decoders, compositions)
    Sometimes,
}

/// Pad template of an element factory
#[derive(Debug, Clone)]
pub struct PadTemplate {
    pub name: String,
    pub direction: PadDirection,
    pub presence: Presence,
    pub caps: Option<String>,
}

impl PadTemplate {
    pub fn new(name: &str, direction: PadDirection, presence: Presence) -> Self {
        Self {
            name: name.to_string(),
            direction,
            presence,
            caps: None,
        }
    }

    pub fn with_caps(mut self, caps: &str) -> Self {
        self.caps = Some(caps.to_string());
        self
    }
}

/// Registered element factory
#[derive(Debug, Clone)]
pub struct FactoryInfo {
    pub name: String,
    pub templates: Vec<PadTemplate>,
    /// Properties every new instance starts with
    pub defaults: Vec<(String, PropertyValue)>,
}

impl FactoryInfo {
    pub fn new(name: &str, templates: Vec<PadTemplate>) -> Self {
        Self {
            name: name.to_string(),
            templates,
            defaults: Vec::new(),
        }
    }

    pub fn with_default(mut self, key: &str, value: impl Into<PropertyValue>) -> Self {
        self.defaults.push((key.to_string(), value.into()));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    Element,
    Bin,
    Pipeline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PadKind {
    Static,
    Request,
    Dynamic,
    Ghost(PadId),
}

struct ElementNode {
    name: String,
    factory: String,
    kind: NodeKind,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
    properties: BTreeMap<String, PropertyValue>,
    pads: Vec<PadId>,
    templates: Vec<PadTemplate>,
    request_counters: HashMap<String, u32>,
    state: State,
}

struct PadNode {
    name: String,
    direction: PadDirection,
    element: ElementId,
    caps: Option<String>,
    peer: Option<PadId>,
    kind: PadKind,
}

struct Inner {
    next_id: u64,
    elements: HashMap<ElementId, ElementNode>,
    pads: HashMap<PadId, PadNode>,
    factories: HashMap<String, FactoryInfo>,
    handlers: HashMap<ElementId, Vec<(HandlerId, PadEventHandler)>>,
    failing_state: Option<State>,
    refused: HashSet<ElementId>,
    refused_pads: HashSet<String>,
    locked: HashSet<ElementId>,
}

impl Inner {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn element(&self, id: ElementId) -> GraphResult<&ElementNode> {
        self.elements.get(&id).ok_or(GraphError::NoSuchElement(id))
    }

    fn element_mut(&mut self, id: ElementId) -> GraphResult<&mut ElementNode> {
        self.elements.get_mut(&id).ok_or(GraphError::NoSuchElement(id))
    }

    fn pad(&self, id: PadId) -> GraphResult<&PadNode> {
        self.pads.get(&id).ok_or(GraphError::NoSuchPad(id))
    }

    fn insert_element(&mut self, name: &str, factory: &str, kind: NodeKind) -> ElementId {
        let id = ElementId(self.next_id());
        self.elements.insert(
            id,
            ElementNode {
                name: name.to_string(),
                factory: factory.to_string(),
                kind,
                parent: None,
                children: Vec::new(),
                properties: BTreeMap::new(),
                pads: Vec::new(),
                templates: Vec::new(),
                request_counters: HashMap::new(),
                state: State::Null,
            },
        );
        id
    }

    fn insert_pad(
        &mut self,
        element: ElementId,
        name: &str,
        direction: PadDirection,
        caps: Option<String>,
        kind: PadKind,
    ) -> GraphResult<PadId> {
        let id = PadId(self.next_id());
        self.element_mut(element)?.pads.push(id);
        self.pads.insert(
            id,
            PadNode {
                name: name.to_string(),
                direction,
                element,
                caps,
                peer: None,
                kind,
            },
        );
        Ok(id)
    }

    fn find_pad(&self, element: ElementId, name: &str) -> Option<PadId> {
        let node = self.elements.get(&element)?;
        node.pads
            .iter()
            .copied()
            .find(|p| self.pads.get(p).map(|pad| pad.name == name).unwrap_or(false))
    }

    fn is_ancestor(&self, candidate: ElementId, of: ElementId) -> bool {
        let mut cursor = Some(of);
        while let Some(id) = cursor {
            if id == candidate {
                return true;
            }
            cursor = self.elements.get(&id).and_then(|e| e.parent);
        }
        false
    }

    fn unlink_pad(&mut self, pad: PadId) {
        let peer = self.pads.get_mut(&pad).and_then(|p| p.peer.take());
        if let Some(peer) = peer {
            if let Some(peer_node) = self.pads.get_mut(&peer) {
                peer_node.peer = None;
            }
        }
    }

    fn drop_pad(&mut self, pad: PadId) {
        self.unlink_pad(pad);
        if let Some(node) = self.pads.remove(&pad) {
            if let Some(element) = self.elements.get_mut(&node.element) {
                element.pads.retain(|p| *p != pad);
            }
        }
    }

    fn link_pads(&mut self, src: PadId, sink: PadId) -> GraphResult<()> {
        let src_node = self.pad(src)?;
        let sink_node = self.pad(sink)?;

        let refuse = |reason: &str| GraphError::LinkRefused {
            src,
            sink,
            reason: reason.to_string(),
        };

        if src_node.direction != PadDirection::Src || sink_node.direction != PadDirection::Sink {
            return Err(refuse("wrong pad directions"));
        }
        if src_node.peer.is_some() {
            return Err(refuse("source pad already linked"));
        }
        if sink_node.peer.is_some() {
            return Err(refuse("sink pad already linked"));
        }
        if self.refused.contains(&sink_node.element) || self.refused_pads.contains(&sink_node.name) {
            return Err(refuse("element refused the link"));
        }

        let src_parent = self.element(src_node.element)?.parent;
        let sink_parent = self.element(sink_node.element)?.parent;
        if src_parent.is_none() || src_parent != sink_parent {
            return Err(refuse("elements do not share a parent bin"));
        }

        if let Some(node) = self.pads.get_mut(&src) {
            node.peer = Some(sink);
        }
        if let Some(node) = self.pads.get_mut(&sink) {
            node.peer = Some(src);
        }
        Ok(())
    }

    fn request_pad(&mut self, element: ElementId, template: &str) -> GraphResult<PadId> {
        let node = self.element(element)?;
        let tmpl = node
            .templates
            .iter()
            .find(|t| t.name == template && t.presence == Presence::Request)
            .cloned()
            .ok_or_else(|| GraphError::NoSuchTemplate {
                element,
                template: template.to_string(),
            })?;

        let node = self.element_mut(element)?;
        let counter = node.request_counters.entry(tmpl.name.clone()).or_insert(0);
        let name = tmpl.name.replace("%u", &counter.to_string());
        *counter += 1;

        self.insert_pad(element, &name, tmpl.direction, tmpl.caps.clone(), PadKind::Request)
    }

    /// First unlinked pad in `direction`, requesting one if none is free
    fn free_pad(&mut self, element: ElementId, direction: PadDirection) -> GraphResult<(PadId, bool)> {
        let node = self.element(element)?;
        let existing = node.pads.iter().copied().find(|p| {
            self.pads
                .get(p)
                .map(|pad| pad.direction == direction && pad.peer.is_none())
                .unwrap_or(false)
        });
        if let Some(pad) = existing {
            return Ok((pad, false));
        }

        let template = node
            .templates
            .iter()
            .find(|t| t.direction == direction && t.presence == Presence::Request)
            .map(|t| t.name.clone());
        match template {
            Some(template) => Ok((self.request_pad(element, &template)?, true)),
            None => Err(GraphError::NoSuchTemplate {
                element,
                template: format!("{:?}", direction).to_lowercase(),
            }),
        }
    }

    fn set_state_recursive(&mut self, element: ElementId, state: State) {
        let children = match self.elements.get_mut(&element) {
            Some(node) => {
                node.state = state;
                node.children.clone()
            }
            None => return,
        };
        for child in children {
            self.set_state_recursive(child, state);
        }
    }

    fn handlers_of(&self, element: ElementId) -> Vec<PadEventHandler> {
        self.handlers
            .get(&element)
            .map(|list| list.iter().map(|(_, handler)| handler.clone()).collect())
            .unwrap_or_default()
    }

    fn dispose_recursive(&mut self, element: ElementId) {
        let Some(node) = self.elements.remove(&element) else {
            return;
        };
        for pad in node.pads {
            self.unlink_pad(pad);
            self.pads.remove(&pad);
        }
        self.handlers.remove(&element);
        self.locked.remove(&element);
        for child in node.children {
            self.dispose_recursive(child);
        }
    }
}

/// Structural media graph held entirely in memory
pub struct MemoryGraph {
    inner: Mutex<Inner>,
}

impl MemoryGraph {
    /// Create a graph with the standard factory set registered
    pub fn new() -> Self {
        let graph = Self {
            inner: Mutex::new(Inner {
                next_id: 0,
                elements: HashMap::new(),
                pads: HashMap::new(),
                factories: HashMap::new(),
                handlers: HashMap::new(),
                failing_state: None,
                refused: HashSet::new(),
                refused_pads: HashSet::new(),
                locked: HashSet::new(),
            }),
        };
        for factory in standard_factories() {
            graph.register_factory(factory);
        }
        graph
    }

    /// Register (or replace) an element factory
    pub fn register_factory(&self, factory: FactoryInfo) {
        self.inner.lock().factories.insert(factory.name.clone(), factory);
    }

    /// Make every future transition to `state` report failure (`None` clears)
    pub fn fail_state_change_to(&self, state: Option<State>) {
        self.inner.lock().failing_state = state;
    }

    /// Refuse any link whose sink pad belongs to `element` (`false` lifts it)
    pub fn refuse_links_into(&self, element: ElementId, refused: bool) {
        let mut inner = self.inner.lock();
        if refused {
            inner.refused.insert(element);
        } else {
            inner.refused.remove(&element);
        }
    }

    /// Refuse any link whose sink pad is called `pad_name`, on any element
    pub fn refuse_links_into_pad(&self, pad_name: &str) {
        self.inner.lock().refused_pads.insert(pad_name.to_string());
    }

    /// Make `remove` of `element` from its bin fail until unlocked
    pub fn lock_in_parent(&self, element: ElementId, locked: bool) {
        let mut inner = self.inner.lock();
        if locked {
            inner.locked.insert(element);
        } else {
            inner.locked.remove(&element);
        }
    }

    /// Pad event handlers currently connected to `element`
    pub fn handler_count(&self, element: ElementId) -> usize {
        self.inner.lock().handlers.get(&element).map(Vec::len).unwrap_or(0)
    }

    /// Add a runtime pad to a source element and notify its listeners
    pub fn add_source_pad(&self, element: ElementId, name: &str, caps: Option<&str>) -> GraphResult<PadId> {
        let (pad, handlers) = {
            let mut inner = self.inner.lock();
            let pad = inner.insert_pad(
                element,
                name,
                PadDirection::Src,
                caps.map(str::to_string),
                PadKind::Dynamic,
            )?;
            (pad, inner.handlers_of(element))
        };

        tracing::trace!("{} gained pad {} ({})", element, name, caps.unwrap_or("no caps"));
        for handler in handlers {
            handler(PadEvent::Added(pad));
        }
        Ok(pad)
    }

    /// Notify listeners that a runtime pad is going away, then drop it
    pub fn remove_source_pad(&self, pad: PadId) -> GraphResult<()> {
        let handlers = {
            let inner = self.inner.lock();
            let element = inner.pad(pad)?.element;
            inner.handlers_of(element)
        };

        for handler in handlers {
            handler(PadEvent::Removed(pad));
        }
        self.inner.lock().drop_pad(pad);
        Ok(())
    }

    /// First element created with `name`
    pub fn element_by_name(&self, name: &str) -> Option<ElementId> {
        let inner = self.inner.lock();
        inner
            .elements
            .iter()
            .filter(|(_, node)| node.name == name)
            .map(|(id, _)| *id)
            .min()
    }

    /// All pads of an element, in creation order
    pub fn pads(&self, element: ElementId) -> Vec<PadId> {
        self.inner
            .lock()
            .elements
            .get(&element)
            .map(|e| e.pads.clone())
            .unwrap_or_default()
    }

    pub fn is_linked(&self, pad: PadId) -> bool {
        self.peer(pad).is_some()
    }

    /// Number of live elements, containers included
    pub fn element_count(&self) -> usize {
        self.inner.lock().elements.len()
    }

    pub fn exists(&self, element: ElementId) -> bool {
        self.inner.lock().elements.contains_key(&element)
    }
}

impl Default for MemoryGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaGraph for MemoryGraph {
    fn make_element(&self, factory: &str, name: &str) -> GraphResult<ElementId> {
        let mut inner = self.inner.lock();
        let info = inner
            .factories
            .get(factory)
            .cloned()
            .ok_or_else(|| GraphError::UnknownFactory(factory.to_string()))?;

        let id = inner.insert_element(name, factory, NodeKind::Element);
        for template in info.templates.iter().filter(|t| t.presence == Presence::Always) {
            inner.insert_pad(id, &template.name, template.direction, template.caps.clone(), PadKind::Static)?;
        }
        let node = inner.element_mut(id)?;
        node.templates = info.templates;
        node.properties.extend(info.defaults);
        Ok(id)
    }

    fn make_bin(&self, name: &str) -> GraphResult<ElementId> {
        Ok(self.inner.lock().insert_element(name, "bin", NodeKind::Bin))
    }

    fn make_pipeline(&self, name: &str) -> GraphResult<ElementId> {
        Ok(self.inner.lock().insert_element(name, "pipeline", NodeKind::Pipeline))
    }

    fn make_element_for_uri(&self, uri: &str, name: &str) -> GraphResult<ElementId> {
        let path = uri
            .strip_prefix("file://")
            .ok_or_else(|| GraphError::UnsupportedUri(uri.to_string()))?;
        let location = urlencoding::decode(path)
            .map_err(|_| GraphError::UnsupportedUri(uri.to_string()))?
            .into_owned();

        let sink = self.make_element("filesink", name)?;
        self.set_property(sink, "location", PropertyValue::Str(location))?;
        Ok(sink)
    }

    fn element_name(&self, element: ElementId) -> Option<String> {
        self.inner.lock().elements.get(&element).map(|e| e.name.clone())
    }

    fn element_factory(&self, element: ElementId) -> Option<String> {
        self.inner.lock().elements.get(&element).map(|e| e.factory.clone())
    }

    fn add(&self, bin: ElementId, child: ElementId) -> GraphResult<()> {
        let mut inner = self.inner.lock();
        if inner.element(bin)?.kind == NodeKind::Element {
            return Err(GraphError::NotABin(bin));
        }
        if inner.element(child)?.parent.is_some() || inner.is_ancestor(child, bin) {
            return Err(GraphError::AlreadyParented { child });
        }
        inner.element_mut(child)?.parent = Some(bin);
        inner.element_mut(bin)?.children.push(child);
        Ok(())
    }

    fn remove(&self, bin: ElementId, child: ElementId) -> GraphResult<()> {
        let mut inner = self.inner.lock();
        if inner.element(child)?.parent != Some(bin) {
            return Err(GraphError::NotAChild { bin, child });
        }
        if inner.locked.contains(&child) {
            return Err(GraphError::RemovalRefused { bin, child });
        }
        for pad in inner.element(child)?.pads.clone() {
            inner.unlink_pad(pad);
        }
        inner.element_mut(child)?.parent = None;
        inner.element_mut(bin)?.children.retain(|c| *c != child);
        Ok(())
    }

    fn parent(&self, element: ElementId) -> Option<ElementId> {
        self.inner.lock().elements.get(&element).and_then(|e| e.parent)
    }

    fn children(&self, bin: ElementId) -> Vec<ElementId> {
        self.inner
            .lock()
            .elements
            .get(&bin)
            .map(|e| e.children.clone())
            .unwrap_or_default()
    }

    fn dispose(&self, element: ElementId) -> GraphResult<()> {
        let mut inner = self.inner.lock();
        if inner.element(element)?.parent.is_some() {
            return Err(GraphError::AlreadyParented { child: element });
        }
        inner.dispose_recursive(element);
        Ok(())
    }

    fn set_property(&self, element: ElementId, key: &str, value: PropertyValue) -> GraphResult<()> {
        self.inner
            .lock()
            .element_mut(element)?
            .properties
            .insert(key.to_string(), value);
        Ok(())
    }

    fn property(&self, element: ElementId, key: &str) -> Option<PropertyValue> {
        self.inner
            .lock()
            .elements
            .get(&element)
            .and_then(|e| e.properties.get(key).cloned())
    }

    fn static_pad(&self, element: ElementId, name: &str) -> Option<PadId> {
        let inner = self.inner.lock();
        inner.find_pad(element, name).filter(|pad| {
            inner
                .pads
                .get(pad)
                .map(|p| matches!(p.kind, PadKind::Static | PadKind::Ghost(_)))
                .unwrap_or(false)
        })
    }

    fn request_pad(&self, element: ElementId, template: &str) -> GraphResult<PadId> {
        self.inner.lock().request_pad(element, template)
    }

    fn release_request_pad(&self, pad: PadId) -> GraphResult<()> {
        let mut inner = self.inner.lock();
        if inner.pad(pad)?.kind != PadKind::Request {
            return Err(GraphError::NotARequestPad(pad));
        }
        inner.drop_pad(pad);
        Ok(())
    }

    fn add_ghost_pad(&self, bin: ElementId, name: &str, target: PadId) -> GraphResult<PadId> {
        let mut inner = self.inner.lock();
        if inner.element(bin)?.kind == NodeKind::Element {
            return Err(GraphError::NotABin(bin));
        }
        let target_node = inner.pad(target)?;
        let (direction, caps, owner) = (target_node.direction, target_node.caps.clone(), target_node.element);
        if inner.element(owner)?.parent != Some(bin) {
            return Err(GraphError::NotAChild { bin, child: owner });
        }
        inner.insert_pad(bin, name, direction, caps, PadKind::Ghost(target))
    }

    fn pad_name(&self, pad: PadId) -> Option<String> {
        self.inner.lock().pads.get(&pad).map(|p| p.name.clone())
    }

    fn pad_caps(&self, pad: PadId) -> Option<String> {
        let inner = self.inner.lock();
        let node = inner.pads.get(&pad)?;
        match node.kind {
            PadKind::Ghost(target) if node.caps.is_none() => inner.pads.get(&target)?.caps.clone(),
            _ => node.caps.clone(),
        }
    }

    fn pad_parent(&self, pad: PadId) -> Option<ElementId> {
        self.inner.lock().pads.get(&pad).map(|p| p.element)
    }

    fn peer(&self, pad: PadId) -> Option<PadId> {
        self.inner.lock().pads.get(&pad).and_then(|p| p.peer)
    }

    fn link_pads(&self, src: PadId, sink: PadId) -> GraphResult<()> {
        self.inner.lock().link_pads(src, sink)
    }

    fn unlink_pads(&self, src: PadId, sink: PadId) -> GraphResult<()> {
        let mut inner = self.inner.lock();
        if inner.pad(src)?.peer != Some(sink) {
            return Err(GraphError::NotLinked { src, sink });
        }
        inner.unlink_pad(src);
        Ok(())
    }

    fn link(&self, src: ElementId, sink: ElementId) -> GraphResult<()> {
        let mut inner = self.inner.lock();
        let no_pads = |_| GraphError::NoCompatiblePads { src, sink };

        let (src_pad, src_requested) = inner.free_pad(src, PadDirection::Src).map_err(no_pads)?;
        let (sink_pad, sink_requested) = match inner.free_pad(sink, PadDirection::Sink) {
            Ok(found) => found,
            Err(_) => {
                if src_requested {
                    inner.drop_pad(src_pad);
                }
                return Err(GraphError::NoCompatiblePads { src, sink });
            }
        };

        let result = inner.link_pads(src_pad, sink_pad);
        if result.is_err() {
            if src_requested {
                inner.drop_pad(src_pad);
            }
            if sink_requested {
                inner.drop_pad(sink_pad);
            }
        }
        result
    }

    fn state(&self, element: ElementId) -> StateSnapshot {
        let current = self
            .inner
            .lock()
            .elements
            .get(&element)
            .map(|e| e.state)
            .unwrap_or_default();
        StateSnapshot {
            current,
            pending: None,
        }
    }

    fn set_state(&self, element: ElementId, state: State) -> StateChange {
        let mut inner = self.inner.lock();
        if !inner.elements.contains_key(&element) || inner.failing_state == Some(state) {
            return StateChange::Failure;
        }
        inner.set_state_recursive(element, state);
        StateChange::Success
    }

    fn connect_pad_events(&self, element: ElementId, handler: PadEventHandler) -> GraphResult<HandlerId> {
        let mut inner = self.inner.lock();
        inner.element(element)?;
        let id = HandlerId(inner.next_id());
        inner.handlers.entry(element).or_default().push((id, handler));
        Ok(id)
    }

    fn disconnect_pad_events(&self, element: ElementId, handler: HandlerId) -> GraphResult<()> {
        let mut inner = self.inner.lock();
        let list = inner
            .handlers
            .get_mut(&element)
            .ok_or(GraphError::NoSuchHandler(handler, element))?;
        let before = list.len();
        list.retain(|(id, _)| *id != handler);
        if list.len() == before {
            return Err(GraphError::NoSuchHandler(handler, element));
        }
        if list.is_empty() {
            inner.handlers.remove(&element);
        }
        Ok(())
    }
}

fn filter_factory(name: &str) -> FactoryInfo {
    FactoryInfo::new(
        name,
        vec![
            PadTemplate::new("sink", PadDirection::Sink, Presence::Always),
            PadTemplate::new("src", PadDirection::Src, Presence::Always),
        ],
    )
}

fn terminal_sink(name: &str) -> FactoryInfo {
    FactoryInfo::new(name, vec![PadTemplate::new("sink", PadDirection::Sink, Presence::Always)])
        .with_default("sync", true)
}

fn muxer(name: &str) -> FactoryInfo {
    FactoryInfo::new(
        name,
        vec![
            PadTemplate::new("sink_%u", PadDirection::Sink, Presence::Request),
            PadTemplate::new("src", PadDirection::Src, Presence::Always),
        ],
    )
}

fn dynamic_source(name: &str) -> FactoryInfo {
    FactoryInfo::new(name, vec![PadTemplate::new("src_%u", PadDirection::Src, Presence::Sometimes)])
}

/// Factories every `MemoryGraph` starts with
fn standard_factories() -> Vec<FactoryInfo> {
    let mut factories = vec![
        FactoryInfo::new(
            "tee",
            vec![
                PadTemplate::new("sink", PadDirection::Sink, Presence::Always),
                PadTemplate::new("src_%u", PadDirection::Src, Presence::Request),
            ],
        ),
        FactoryInfo::new(
            "videotestsrc",
            vec![PadTemplate::new("src", PadDirection::Src, Presence::Always).with_caps("video/x-raw-yuv")],
        ),
        FactoryInfo::new(
            "audiotestsrc",
            vec![PadTemplate::new("src", PadDirection::Src, Presence::Always).with_caps("audio/x-raw-int")],
        ),
        terminal_sink("filesink"),
        dynamic_source("decodebin"),
        dynamic_source("uridecodebin"),
        dynamic_source("nlecomposition"),
    ];

    for name in [
        "queue",
        "identity",
        "audioconvert",
        "audioresample",
        "videoconvert",
        "videoscale",
        "ffmpegcolorspace",
        "theoraenc",
        "vorbisenc",
        "x264enc",
        "vp8enc",
        "vp9enc",
        "opusenc",
        "flacenc",
        "lamemp3enc",
        "avenc_aac",
        "jpegenc",
    ] {
        factories.push(filter_factory(name));
    }
    for name in ["fakesink", "autovideosink", "autoaudiosink", "xvimagesink", "alsasink", "pulsesink"] {
        factories.push(terminal_sink(name));
    }
    for name in ["oggmux", "matroskamux", "webmmux", "mp4mux", "avimux"] {
        factories.push(muxer(name));
    }
    factories
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn pipeline_with(graph: &MemoryGraph, factories: &[(&str, &str)]) -> (ElementId, Vec<ElementId>) {
        let pipeline = graph.make_pipeline("test").unwrap();
        let elements = factories
            .iter()
            .map(|(factory, name)| {
                let el = graph.make_element(factory, name).unwrap();
                graph.add(pipeline, el).unwrap();
                el
            })
            .collect();
        (pipeline, elements)
    }

    #[test]
    fn test_unknown_factory() {
        let graph = MemoryGraph::new();
        assert_eq!(
            graph.make_element("nosuchenc", "x"),
            Err(GraphError::UnknownFactory("nosuchenc".to_string()))
        );
    }

    #[test]
    fn test_link_requires_common_parent() {
        let graph = MemoryGraph::new();
        let pipeline = graph.make_pipeline("p").unwrap();
        let q1 = graph.make_element("queue", "q1").unwrap();
        let q2 = graph.make_element("queue", "q2").unwrap();
        graph.add(pipeline, q1).unwrap();

        assert!(graph.link(q1, q2).is_err());
        graph.add(pipeline, q2).unwrap();
        assert!(graph.link(q1, q2).is_ok());

        let src = graph.static_pad(q1, "src").unwrap();
        let sink = graph.static_pad(q2, "sink").unwrap();
        assert_eq!(graph.peer(src), Some(sink));
    }

    #[test]
    fn test_tee_request_pads_fan_out() {
        let graph = MemoryGraph::new();
        let (_, els) = pipeline_with(&graph, &[("tee", "t"), ("fakesink", "a"), ("fakesink", "b")]);

        graph.link(els[0], els[1]).unwrap();
        graph.link(els[0], els[2]).unwrap();

        let names: Vec<String> = graph
            .pads(els[0])
            .into_iter()
            .filter_map(|p| graph.pad_name(p))
            .collect();
        assert_eq!(names, vec!["sink", "src_0", "src_1"]);
    }

    #[test]
    fn test_failed_link_releases_requested_pads() {
        let graph = MemoryGraph::new();
        let (_, els) = pipeline_with(&graph, &[("tee", "t"), ("fakesink", "s")]);
        graph.refuse_links_into(els[1], true);

        assert!(graph.link(els[0], els[1]).is_err());
        assert_eq!(graph.pads(els[0]).len(), 1);
    }

    #[test]
    fn test_remove_breaks_links() {
        let graph = MemoryGraph::new();
        let (pipeline, els) = pipeline_with(&graph, &[("queue", "q"), ("fakesink", "s")]);
        graph.link(els[0], els[1]).unwrap();

        graph.remove(pipeline, els[1]).unwrap();
        assert!(!graph.is_linked(graph.static_pad(els[0], "src").unwrap()));
        assert_eq!(graph.parent(els[1]), None);
    }

    #[test]
    fn test_ghost_pad_links_at_bin_level() {
        let graph = MemoryGraph::new();
        let (pipeline, els) = pipeline_with(&graph, &[("queue", "up")]);
        let bin = graph.make_bin("inner").unwrap();
        let q = graph.make_element("queue", "q").unwrap();
        graph.add(bin, q).unwrap();
        let ghost = graph
            .add_ghost_pad(bin, "sink", graph.static_pad(q, "sink").unwrap())
            .unwrap();
        graph.add(pipeline, bin).unwrap();

        graph
            .link_pads(graph.static_pad(els[0], "src").unwrap(), ghost)
            .unwrap();
        assert_eq!(graph.static_pad(bin, "sink"), Some(ghost));
    }

    #[test]
    fn test_uri_sink_location_is_decoded() {
        let graph = MemoryGraph::new();
        let sink = graph
            .make_element_for_uri("file:///tmp/my%20render.ogg", "fsink")
            .unwrap();
        assert_eq!(
            graph.property(sink, "location"),
            Some(PropertyValue::Str("/tmp/my render.ogg".to_string()))
        );
        assert!(matches!(
            graph.make_element_for_uri("http://example.com/out.ogg", "fsink"),
            Err(GraphError::UnsupportedUri(_))
        ));
    }

    #[test]
    fn test_state_propagates_and_can_fail() {
        let graph = MemoryGraph::new();
        let (pipeline, els) = pipeline_with(&graph, &[("queue", "q")]);

        assert_eq!(graph.set_state(pipeline, State::Paused), StateChange::Success);
        assert_eq!(graph.state(els[0]).current, State::Paused);

        graph.fail_state_change_to(Some(State::Playing));
        assert!(graph.set_state(pipeline, State::Playing).is_failure());
        assert_eq!(graph.state(pipeline).current, State::Paused);
    }

    #[test]
    fn test_source_pad_events_are_delivered() {
        let graph = MemoryGraph::new();
        let src = graph.make_element("decodebin", "dec").unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler = graph
            .connect_pad_events(src, Arc::new(move |ev: PadEvent| sink.lock().push(ev)))
            .unwrap();

        let pad = graph.add_source_pad(src, "src_0", Some("audio/x-raw-int")).unwrap();
        graph.remove_source_pad(pad).unwrap();

        assert_eq!(*seen.lock(), vec![PadEvent::Added(pad), PadEvent::Removed(pad)]);
        assert!(graph.pads(src).is_empty());

        graph.disconnect_pad_events(src, handler).unwrap();
        assert_eq!(graph.handler_count(src), 0);
        graph.add_source_pad(src, "src_1", None).unwrap();
        assert_eq!(seen.lock().len(), 2);
        assert!(graph.disconnect_pad_events(src, handler).is_err());
    }

    #[test]
    fn test_refused_pad_name_blocks_link() {
        let graph = MemoryGraph::new();
        let (_, els) = pipeline_with(&graph, &[("queue", "a"), ("queue", "b")]);
        graph.refuse_links_into_pad("sink");

        assert!(matches!(graph.link(els[0], els[1]), Err(GraphError::LinkRefused { .. })));
    }

    #[test]
    fn test_locked_child_stays_in_bin() {
        let graph = MemoryGraph::new();
        let (pipeline, els) = pipeline_with(&graph, &[("queue", "q"), ("fakesink", "s")]);
        graph.link(els[0], els[1]).unwrap();
        graph.lock_in_parent(els[1], true);

        assert_eq!(
            graph.remove(pipeline, els[1]),
            Err(GraphError::RemovalRefused { bin: pipeline, child: els[1] })
        );
        assert!(graph.is_linked(graph.static_pad(els[0], "src").unwrap()));

        graph.lock_in_parent(els[1], false);
        graph.remove(pipeline, els[1]).unwrap();
    }

    #[test]
    fn test_dispose_frees_children() {
        let graph = MemoryGraph::new();
        let bin = graph.make_bin("b").unwrap();
        let q = graph.make_element("queue", "q").unwrap();
        graph.add(bin, q).unwrap();

        graph.dispose(bin).unwrap();
        assert!(!graph.exists(bin));
        assert!(!graph.exists(q));
    }
}
