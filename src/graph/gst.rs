//! GStreamer binding
//!
//! `GstGraph` drives real GStreamer elements through the `MediaGraph` seam.
//! Elements and pads get a handle the first time they cross the seam; the
//! handle stays valid until the element is disposed.
//!
//! The registry lock is never held across a call that can emit signals
//! (`request_pad_simple`, `add_pad`, `set_state`, ...), because pad-added
//! handlers take it from streaming threads.

use super::error::{GraphError, GraphResult};
use super::traits::MediaGraph;
use super::types::{
    ElementId, HandlerId, PadEvent, PadEventHandler, PadId, PropertyValue, State, StateChange,
    StateSnapshot,
};
use gstreamer as gst;
use gstreamer::glib;
use gstreamer::prelude::*;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
struct Registry {
    next_id: u64,
    elements: HashMap<ElementId, gst::Element>,
    element_ids: HashMap<gst::Element, ElementId>,
    pads: HashMap<PadId, gst::Pad>,
    pad_ids: HashMap<gst::Pad, PadId>,
    handlers: HashMap<HandlerId, (ElementId, Vec<glib::SignalHandlerId>)>,
}

impl Registry {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn element_id(&mut self, element: &gst::Element) -> ElementId {
        if let Some(id) = self.element_ids.get(element) {
            return *id;
        }
        let id = ElementId(self.next_id());
        self.elements.insert(id, element.clone());
        self.element_ids.insert(element.clone(), id);
        id
    }

    fn pad_id(&mut self, pad: &gst::Pad) -> PadId {
        if let Some(id) = self.pad_ids.get(pad) {
            return *id;
        }
        let id = PadId(self.next_id());
        self.pads.insert(id, pad.clone());
        self.pad_ids.insert(pad.clone(), id);
        id
    }

    fn element(&self, id: ElementId) -> GraphResult<gst::Element> {
        self.elements.get(&id).cloned().ok_or(GraphError::NoSuchElement(id))
    }

    fn pad(&self, id: PadId) -> GraphResult<gst::Pad> {
        self.pads.get(&id).cloned().ok_or(GraphError::NoSuchPad(id))
    }

    fn forget_pad(&mut self, pad: &gst::Pad) {
        if let Some(id) = self.pad_ids.remove(pad) {
            self.pads.remove(&id);
        }
    }

    fn forget_elements(&mut self, elements: &[gst::Element]) {
        for element in elements {
            if let Some(id) = self.element_ids.remove(element) {
                self.elements.remove(&id);
                self.handlers.retain(|_, (owner, _)| *owner != id);
            }
        }
        let stale: Vec<gst::Pad> = self
            .pad_ids
            .keys()
            .filter(|pad| {
                pad.parent_element()
                    .map(|parent| elements.contains(&parent))
                    .unwrap_or(true)
            })
            .cloned()
            .collect();
        for pad in stale {
            self.forget_pad(&pad);
        }
    }
}

/// `MediaGraph` backed by GStreamer
pub struct GstGraph {
    registry: Arc<Mutex<Registry>>,
}

impl GstGraph {
    /// Initialize GStreamer and create an empty registry
    pub fn new() -> GraphResult<Self> {
        gst::init().map_err(|e| GraphError::Framework(e.to_string()))?;
        tracing::info!("GStreamer {} initialized", gst::version_string());
        Ok(Self {
            registry: Arc::new(Mutex::new(Registry::default())),
        })
    }

    fn element(&self, id: ElementId) -> GraphResult<gst::Element> {
        self.registry.lock().element(id)
    }

    fn bin(&self, id: ElementId) -> GraphResult<gst::Bin> {
        self.element(id)?
            .downcast::<gst::Bin>()
            .map_err(|_| GraphError::NotABin(id))
    }

    fn pad(&self, id: PadId) -> GraphResult<gst::Pad> {
        self.registry.lock().pad(id)
    }

    fn register(&self, element: gst::Element) -> ElementId {
        self.registry.lock().element_id(&element)
    }

    fn register_pad(&self, pad: &gst::Pad) -> PadId {
        self.registry.lock().pad_id(pad)
    }
}

fn to_gst(state: State) -> gst::State {
    match state {
        State::Null => gst::State::Null,
        State::Ready => gst::State::Ready,
        State::Paused => gst::State::Paused,
        State::Playing => gst::State::Playing,
    }
}

fn from_gst(state: gst::State) -> Option<State> {
    match state {
        gst::State::Null => Some(State::Null),
        gst::State::Ready => Some(State::Ready),
        gst::State::Paused => Some(State::Paused),
        gst::State::Playing => Some(State::Playing),
        _ => None,
    }
}

/// Textual form GStreamer deserializes into the property's own type
fn serialized(value: &PropertyValue) -> String {
    match value {
        PropertyValue::Bool(b) => b.to_string(),
        PropertyValue::Int(i) => i.to_string(),
        PropertyValue::UInt(u) => u.to_string(),
        PropertyValue::Double(d) => d.to_string(),
        PropertyValue::Str(s) => s.clone(),
    }
}

fn property_value(value: &glib::Value) -> Option<PropertyValue> {
    let kind = value.type_();
    if kind == glib::Type::BOOL {
        value.get::<bool>().ok().map(PropertyValue::Bool)
    } else if kind == glib::Type::I32 {
        value.get::<i32>().ok().map(PropertyValue::from)
    } else if kind == glib::Type::I64 {
        value.get::<i64>().ok().map(PropertyValue::Int)
    } else if kind == glib::Type::U32 {
        value.get::<u32>().ok().map(|u| PropertyValue::UInt(u.into()))
    } else if kind == glib::Type::U64 {
        value.get::<u64>().ok().map(PropertyValue::UInt)
    } else if kind == glib::Type::F64 {
        value.get::<f64>().ok().map(PropertyValue::Double)
    } else if kind == glib::Type::F32 {
        value.get::<f32>().ok().map(|f| PropertyValue::Double(f.into()))
    } else if kind == glib::Type::STRING {
        value.get::<Option<String>>().ok().flatten().map(PropertyValue::Str)
    } else {
        value.serialize().ok().map(|s| PropertyValue::Str(s.to_string()))
    }
}

/// Elements of a bin, optionally recursing, in insertion order
fn collect(mut iter: gst::Iterator<gst::Element>) -> Vec<gst::Element> {
    let mut elements = Vec::new();
    loop {
        match iter.next() {
            Ok(Some(element)) => elements.push(element),
            Ok(None) => break,
            Err(gst::IteratorError::Resync) => {
                elements.clear();
                iter.resync();
            }
            Err(gst::IteratorError::Error) => {
                tracing::warn!("Bin iteration failed");
                break;
            }
        }
    }
    // GstBin prepends children
    elements.reverse();
    elements
}

impl MediaGraph for GstGraph {
    fn make_element(&self, factory: &str, name: &str) -> GraphResult<ElementId> {
        if gst::ElementFactory::find(factory).is_none() {
            return Err(GraphError::UnknownFactory(factory.to_string()));
        }
        let element = gst::ElementFactory::make(factory)
            .name(name)
            .build()
            .map_err(|e| GraphError::Framework(e.to_string()))?;
        Ok(self.register(element))
    }

    fn make_bin(&self, name: &str) -> GraphResult<ElementId> {
        Ok(self.register(gst::Bin::with_name(name).upcast()))
    }

    fn make_pipeline(&self, name: &str) -> GraphResult<ElementId> {
        Ok(self.register(gst::Pipeline::with_name(name).upcast()))
    }

    fn make_element_for_uri(&self, uri: &str, name: &str) -> GraphResult<ElementId> {
        let element = gst::Element::make_from_uri(gst::URIType::Sink, uri, Some(name))
            .map_err(|_| GraphError::UnsupportedUri(uri.to_string()))?;
        Ok(self.register(element))
    }

    fn element_name(&self, element: ElementId) -> Option<String> {
        self.element(element).ok().map(|e| e.name().to_string())
    }

    fn element_factory(&self, element: ElementId) -> Option<String> {
        let element = self.element(element).ok()?;
        if let Some(factory) = element.factory() {
            return Some(factory.name().to_string());
        }
        if element.is::<gst::Pipeline>() {
            Some("pipeline".to_string())
        } else if element.is::<gst::Bin>() {
            Some("bin".to_string())
        } else {
            None
        }
    }

    fn add(&self, bin: ElementId, child: ElementId) -> GraphResult<()> {
        let container = self.bin(bin)?;
        let element = self.element(child)?;
        container.add(&element).map_err(|e| {
            if element.parent().is_some() {
                GraphError::AlreadyParented { child }
            } else {
                GraphError::Framework(e.to_string())
            }
        })
    }

    fn remove(&self, bin: ElementId, child: ElementId) -> GraphResult<()> {
        let container = self.bin(bin)?;
        let element = self.element(child)?;
        let owned = element
            .parent()
            .map(|parent| parent == container.clone().upcast::<gst::Object>())
            .unwrap_or(false);
        if !owned {
            return Err(GraphError::NotAChild { bin, child });
        }
        container
            .remove(&element)
            .map_err(|_| GraphError::RemovalRefused { bin, child })
    }

    fn parent(&self, element: ElementId) -> Option<ElementId> {
        let parent = self
            .element(element)
            .ok()?
            .parent()
            .and_then(|p| p.downcast::<gst::Element>().ok())?;
        Some(self.register(parent))
    }

    fn children(&self, bin: ElementId) -> Vec<ElementId> {
        let Ok(container) = self.bin(bin) else {
            return Vec::new();
        };
        let children = collect(container.iterate_elements());
        let mut registry = self.registry.lock();
        children.iter().map(|c| registry.element_id(c)).collect()
    }

    fn dispose(&self, element: ElementId) -> GraphResult<()> {
        let target = self.element(element)?;
        if target.parent().is_some() {
            return Err(GraphError::AlreadyParented { child: element });
        }
        if target.set_state(gst::State::Null).is_err() {
            tracing::warn!("{} did not reach NULL before disposal", element);
        }

        let mut doomed = match target.downcast_ref::<gst::Bin>() {
            Some(bin) => collect(bin.iterate_recurse()),
            None => Vec::new(),
        };
        doomed.push(target);
        self.registry.lock().forget_elements(&doomed);
        Ok(())
    }

    fn set_property(&self, element: ElementId, key: &str, value: PropertyValue) -> GraphResult<()> {
        let target = self.element(element)?;
        let missing = || GraphError::NoSuchProperty {
            element,
            key: key.to_string(),
        };
        let pspec = target.find_property(key).ok_or_else(missing)?;
        if !pspec.flags().contains(glib::ParamFlags::WRITABLE) {
            return Err(missing());
        }

        let text = serialized(&value);
        let converted = glib::Value::deserialize(&text, pspec.value_type()).map_err(|e| {
            GraphError::Framework(format!("'{}' is not a valid {} for {}: {}", text, pspec.value_type(), key, e))
        })?;
        target.set_property_from_value(key, &converted);
        Ok(())
    }

    fn property(&self, element: ElementId, key: &str) -> Option<PropertyValue> {
        let target = self.element(element).ok()?;
        target.find_property(key)?;
        property_value(&target.property_value(key))
    }

    fn static_pad(&self, element: ElementId, name: &str) -> Option<PadId> {
        let pad = self.element(element).ok()?.static_pad(name)?;
        Some(self.register_pad(&pad))
    }

    fn request_pad(&self, element: ElementId, template: &str) -> GraphResult<PadId> {
        let target = self.element(element)?;
        let pad = target
            .request_pad_simple(template)
            .ok_or_else(|| GraphError::NoSuchTemplate {
                element,
                template: template.to_string(),
            })?;
        Ok(self.register_pad(&pad))
    }

    fn release_request_pad(&self, pad: PadId) -> GraphResult<()> {
        let target = self.pad(pad)?;
        let requested = target
            .pad_template()
            .map(|t| t.presence() == gst::PadPresence::Request)
            .unwrap_or(false);
        let owner = target.parent_element().ok_or(GraphError::NoSuchPad(pad))?;
        if !requested {
            return Err(GraphError::NotARequestPad(pad));
        }
        owner.release_request_pad(&target);
        self.registry.lock().forget_pad(&target);
        Ok(())
    }

    fn add_ghost_pad(&self, bin: ElementId, name: &str, target: PadId) -> GraphResult<PadId> {
        let container = self.bin(bin)?;
        let target = self.pad(target)?;
        let ghost = gst::GhostPad::builder_with_target(&target)
            .map_err(|e| GraphError::Framework(e.to_string()))?
            .name(name)
            .build();
        ghost
            .set_active(true)
            .map_err(|e| GraphError::Framework(e.to_string()))?;
        container
            .add_pad(&ghost)
            .map_err(|e| GraphError::Framework(e.to_string()))?;
        Ok(self.register_pad(ghost.upcast_ref()))
    }

    fn pad_name(&self, pad: PadId) -> Option<String> {
        self.pad(pad).ok().map(|p| p.name().to_string())
    }

    fn pad_caps(&self, pad: PadId) -> Option<String> {
        let pad = self.pad(pad).ok()?;
        let caps = pad.current_caps().unwrap_or_else(|| pad.query_caps(None));
        caps.structure(0).map(|s| s.name().to_string())
    }

    fn pad_parent(&self, pad: PadId) -> Option<ElementId> {
        let parent = self.pad(pad).ok()?.parent_element()?;
        Some(self.register(parent))
    }

    fn peer(&self, pad: PadId) -> Option<PadId> {
        let peer = self.pad(pad).ok()?.peer()?;
        Some(self.register_pad(&peer))
    }

    fn link_pads(&self, src: PadId, sink: PadId) -> GraphResult<()> {
        let (src_pad, sink_pad) = (self.pad(src)?, self.pad(sink)?);
        src_pad
            .link(&sink_pad)
            .map(|_| ())
            .map_err(|e| GraphError::LinkRefused {
                src,
                sink,
                reason: format!("{:?}", e),
            })
    }

    fn unlink_pads(&self, src: PadId, sink: PadId) -> GraphResult<()> {
        let (src_pad, sink_pad) = (self.pad(src)?, self.pad(sink)?);
        src_pad
            .unlink(&sink_pad)
            .map_err(|_| GraphError::NotLinked { src, sink })
    }

    fn link(&self, src: ElementId, sink: ElementId) -> GraphResult<()> {
        let (upstream, downstream) = (self.element(src)?, self.element(sink)?);
        upstream
            .link(&downstream)
            .map_err(|_| GraphError::NoCompatiblePads { src, sink })
    }

    fn state(&self, element: ElementId) -> StateSnapshot {
        let Ok(target) = self.element(element) else {
            return StateSnapshot {
                current: State::Null,
                pending: None,
            };
        };
        let (_, current, pending) = target.state(gst::ClockTime::ZERO);
        StateSnapshot {
            current: from_gst(current).unwrap_or_default(),
            pending: from_gst(pending),
        }
    }

    fn set_state(&self, element: ElementId, state: State) -> StateChange {
        let Ok(target) = self.element(element) else {
            return StateChange::Failure;
        };
        match target.set_state(to_gst(state)) {
            Ok(gst::StateChangeSuccess::Success) => StateChange::Success,
            Ok(gst::StateChangeSuccess::Async) => StateChange::Async,
            Ok(gst::StateChangeSuccess::NoPreroll) => StateChange::NoPreroll,
            Err(_) => StateChange::Failure,
        }
    }

    fn connect_pad_events(&self, element: ElementId, handler: PadEventHandler) -> GraphResult<HandlerId> {
        let target = self.element(element)?;

        let added = {
            let registry = self.registry.clone();
            let handler = handler.clone();
            target.connect_pad_added(move |_, pad| {
                let id = registry.lock().pad_id(pad);
                handler(PadEvent::Added(id));
            })
        };
        let removed = {
            let registry = self.registry.clone();
            target.connect_pad_removed(move |_, pad| {
                let id = registry.lock().pad_id(pad);
                handler(PadEvent::Removed(id));
                registry.lock().forget_pad(pad);
            })
        };

        let mut registry = self.registry.lock();
        let id = HandlerId(registry.next_id());
        registry.handlers.insert(id, (element, vec![added, removed]));
        Ok(id)
    }

    fn disconnect_pad_events(&self, element: ElementId, handler: HandlerId) -> GraphResult<()> {
        let (target, signals) = {
            let mut registry = self.registry.lock();
            match registry.handlers.get(&handler) {
                Some((owner, _)) if *owner == element => {}
                _ => return Err(GraphError::NoSuchHandler(handler, element)),
            }
            let target = registry.element(element)?;
            let signals = registry
                .handlers
                .remove(&handler)
                .map(|(_, signals)| signals)
                .unwrap_or_default();
            (target, signals)
        };
        for signal in signals {
            target.disconnect(signal);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Graph with the core elements available, or `None` when GStreamer
    /// is not installed on this machine
    fn graph() -> Option<GstGraph> {
        let graph = GstGraph::new().ok()?;
        ["tee", "queue", "fakesink", "filesink"]
            .iter()
            .all(|f| gst::ElementFactory::find(f).is_some())
            .then_some(graph)
    }

    #[test]
    fn test_tee_request_pads() {
        let Some(graph) = graph() else { return };
        let pipeline = graph.make_pipeline("p").unwrap();
        let tee = graph.make_element("tee", "t").unwrap();
        let sink = graph.make_element("fakesink", "s").unwrap();
        graph.add(pipeline, tee).unwrap();
        graph.add(pipeline, sink).unwrap();

        let first = graph.request_pad(tee, "src_%u").unwrap();
        let second = graph.request_pad(tee, "src_%u").unwrap();
        assert_eq!(graph.pad_name(first).as_deref(), Some("src_0"));
        assert_eq!(graph.pad_name(second).as_deref(), Some("src_1"));

        let target = graph.static_pad(sink, "sink").unwrap();
        graph.link_pads(first, target).unwrap();
        assert_eq!(graph.peer(target), Some(first));

        graph.unlink_pads(first, target).unwrap();
        graph.release_request_pad(first).unwrap();
        assert!(graph.release_request_pad(target).is_err());
        assert_eq!(graph.children(pipeline), vec![tee, sink]);
    }

    #[test]
    fn test_ghost_pad_and_removal() {
        let Some(graph) = graph() else { return };
        let pipeline = graph.make_pipeline("p").unwrap();
        let bin = graph.make_bin("inner").unwrap();
        let queue = graph.make_element("queue", "q").unwrap();
        graph.add(bin, queue).unwrap();
        let ghost = graph
            .add_ghost_pad(bin, "sink", graph.static_pad(queue, "sink").unwrap())
            .unwrap();
        graph.add(pipeline, bin).unwrap();

        assert_eq!(graph.static_pad(bin, "sink"), Some(ghost));
        assert_eq!(graph.element_factory(bin).as_deref(), Some("bin"));
        assert_eq!(graph.element_factory(pipeline).as_deref(), Some("pipeline"));
        assert_eq!(graph.parent(queue), Some(bin));

        assert!(matches!(graph.add(pipeline, queue), Err(GraphError::AlreadyParented { .. })));
        graph.remove(pipeline, bin).unwrap();
        assert_eq!(graph.remove(pipeline, bin), Err(GraphError::NotAChild { bin: pipeline, child: bin }));
        graph.dispose(bin).unwrap();
        assert_eq!(graph.element_name(queue), None);
    }

    #[test]
    fn test_properties_round_trip() {
        let Some(graph) = graph() else { return };
        let sink = graph.make_element("fakesink", "s").unwrap();
        let queue = graph.make_element("queue", "q").unwrap();

        graph.set_property(sink, "sync", PropertyValue::Bool(false)).unwrap();
        assert_eq!(graph.property(sink, "sync"), Some(PropertyValue::Bool(false)));

        graph.set_property(queue, "max-size-buffers", PropertyValue::Int(5)).unwrap();
        assert_eq!(graph.property(queue, "max-size-buffers"), Some(PropertyValue::UInt(5)));

        assert!(matches!(
            graph.set_property(queue, "no-such-thing", PropertyValue::Int(1)),
            Err(GraphError::NoSuchProperty { .. })
        ));
    }

    #[test]
    fn test_uri_sink() {
        let Some(graph) = graph() else { return };
        let sink = graph.make_element_for_uri("file:///tmp/out.ogg", "fsink").unwrap();

        assert_eq!(graph.element_factory(sink).as_deref(), Some("filesink"));
        assert_eq!(graph.element_name(sink).as_deref(), Some("fsink"));
        assert_eq!(
            graph.property(sink, "location"),
            Some(PropertyValue::Str("/tmp/out.ogg".to_string()))
        );
    }

    #[test]
    fn test_state_changes() {
        let Some(graph) = graph() else { return };
        let pipeline = graph.make_pipeline("p").unwrap();
        let sink = graph.make_element("fakesink", "s").unwrap();
        graph.add(pipeline, sink).unwrap();

        assert_eq!(graph.set_state(pipeline, State::Ready), StateChange::Success);
        assert_eq!(graph.state(pipeline).current, State::Ready);
        assert_eq!(graph.state(sink).current, State::Ready);
        graph.set_state(pipeline, State::Null);
    }

    #[test]
    fn test_pad_events_stop_after_disconnect() {
        let Some(graph) = graph() else { return };
        let bin = graph.make_bin("source").unwrap();
        let element = graph.element(bin).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        let handler = graph
            .connect_pad_events(bin, Arc::new(move |ev: PadEvent| log.lock().push(ev)))
            .unwrap();

        let pad = gst::Pad::builder(gst::PadDirection::Src).name("vsrc").build();
        element.add_pad(&pad).unwrap();
        let id = graph.static_pad(bin, "vsrc").unwrap();
        element.remove_pad(&pad).unwrap();
        assert_eq!(*seen.lock(), vec![PadEvent::Added(id), PadEvent::Removed(id)]);

        graph.disconnect_pad_events(bin, handler).unwrap();
        let pad = gst::Pad::builder(gst::PadDirection::Src).name("asrc").build();
        element.add_pad(&pad).unwrap();
        assert_eq!(seen.lock().len(), 2);
        assert!(graph.disconnect_pad_events(bin, handler).is_err());
    }
}
