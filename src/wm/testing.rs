//! Recording fakes for the collaborators of the client layer.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};

use crate::config::Config;
use crate::shared::{BorderInsets, Geometry, Point, Size};
use crate::wm::client_flags::{ActivityFlags, AllowedActions, NetState, Protocols, WindowType};
use crate::wm::context::{Clock, Context};
use crate::wm::decorations::{Decoration, DecorationFactory};
use crate::wm::geometry::Gravity;
use crate::wm::hints::{MotifHints, ResourceClass, WmHints};
use crate::wm::protocol::{
    Desktop, InputSelection, MappingState, ProtocolMessage, Timestamp, WindowId, WindowServer,
};
use crate::wm::scheduler::{Invocation, ProcessId, Scheduler, TimerId};
use crate::wm::workspace::Workspace;

pub const ROOT: WindowId = 0x1;

/// One recorded protocol write
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create(WindowId, WindowId, Geometry),
    Destroy(WindowId),
    Map(WindowId),
    Unmap(WindowId),
    Reparent(WindowId, WindowId, Point),
    MoveResize(WindowId, Geometry),
    Resize(WindowId, Size),
    Lower(WindowId),
    SelectInput(WindowId, InputSelection),
    SaveSetAdd(WindowId),
    SaveSetRemove(WindowId),
    ConfigureNotify(WindowId, Geometry),
    MappingState(WindowId, MappingState),
    NetState(WindowId, NetState, NetState),
    Desktop(WindowId, Option<Desktop>),
    AllowedActions(WindowId, AllowedActions),
    FrameExtents(WindowId, BorderInsets),
    VisibleName(WindowId, Option<String>),
    VisibleIconName(WindowId, Option<String>),
    Message(WindowId, ProtocolMessage, Timestamp),
    InputFocus(WindowId, Timestamp),
    KillClient(WindowId),
    BoundingShape(WindowId, Option<Vec<Geometry>>),
    CopyShape(WindowId, WindowId, Point),
    Grab,
    Ungrab,
    Sync,
}

impl Call {
    /// Window the call acts on, if any
    pub fn window(&self) -> Option<WindowId> {
        match self {
            Call::Create(id, ..) => Some(*id),
            Call::Destroy(w)
            | Call::Map(w)
            | Call::Unmap(w)
            | Call::Reparent(w, ..)
            | Call::MoveResize(w, _)
            | Call::Resize(w, _)
            | Call::Lower(w)
            | Call::SelectInput(w, _)
            | Call::SaveSetAdd(w)
            | Call::SaveSetRemove(w)
            | Call::ConfigureNotify(w, _)
            | Call::MappingState(w, _)
            | Call::NetState(w, ..)
            | Call::Desktop(w, _)
            | Call::AllowedActions(w, _)
            | Call::FrameExtents(w, _)
            | Call::VisibleName(w, _)
            | Call::VisibleIconName(w, _)
            | Call::Message(w, ..)
            | Call::InputFocus(w, _)
            | Call::KillClient(w)
            | Call::BoundingShape(w, _)
            | Call::CopyShape(w, ..) => Some(*w),
            Call::Grab | Call::Ungrab | Call::Sync => None,
        }
    }
}

/// Property fixture of a client window
#[derive(Debug, Clone, Default)]
pub struct FakeWindow {
    pub geometry: Option<Geometry>,
    pub protocols: Protocols,
    pub wm_hints: WmHints,
    pub gravity: Gravity,
    pub motif: MotifHints,
    pub name: String,
    pub icon_name: String,
    pub class: ResourceClass,
    pub pid: Option<u32>,
    pub client_machine: Option<String>,
    pub client_leader: Option<WindowId>,
    pub transient_for: Option<WindowId>,
    pub window_type: WindowType,
    pub desktop: Option<Desktop>,
    pub net_state: NetState,
    pub has_shape: bool,
}

impl FakeWindow {
    pub fn at(geometry: Geometry) -> Self {
        Self {
            geometry: Some(geometry),
            ..Self::default()
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_protocols(mut self, protocols: Protocols) -> Self {
        self.protocols = protocols;
        self
    }

    pub fn with_process(mut self, pid: u32, machine: &str) -> Self {
        self.pid = Some(pid);
        self.client_machine = Some(machine.to_string());
        self
    }
}

pub struct FakeServer {
    pub calls: Vec<Call>,
    pub windows: HashMap<WindowId, FakeWindow>,
    /// Every write fails while set, after being recorded
    pub fail_writes: bool,
    next_id: WindowId,
}

impl FakeServer {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            windows: HashMap::new(),
            fail_writes: false,
            next_id: 0x0100_0000,
        }
    }

    pub fn add_window(&mut self, window: WindowId, fixture: FakeWindow) {
        self.windows.insert(window, fixture);
    }

    pub fn window_mut(&mut self, window: WindowId) -> &mut FakeWindow {
        self.windows.entry(window).or_default()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    pub fn messages(&self) -> Vec<(WindowId, ProtocolMessage, Timestamp)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Message(w, m, t) => Some((*w, *m, *t)),
                _ => None,
            })
            .collect()
    }

    /// Configure requests, frame or client, issued since the last clear
    pub fn geometry_writes(&self) -> usize {
        self.count(|c| matches!(c, Call::MoveResize(..) | Call::ConfigureNotify(..)))
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }

    fn record(&mut self, call: Call) -> Result<()> {
        self.calls.push(call);
        if self.fail_writes {
            return Err(anyhow!("connection broken"));
        }
        Ok(())
    }

    fn fixture(&self, window: WindowId) -> Option<&FakeWindow> {
        self.windows.get(&window)
    }
}

impl WindowServer for FakeServer {
    fn create_container(&mut self, parent: WindowId, geometry: Geometry, _background: Option<u32>) -> Result<WindowId> {
        let id = self.next_id;
        self.next_id += 1;
        self.record(Call::Create(id, parent, geometry))?;
        Ok(id)
    }

    fn destroy_window(&mut self, window: WindowId) -> Result<()> {
        self.record(Call::Destroy(window))
    }

    fn map_window(&mut self, window: WindowId) -> Result<()> {
        self.record(Call::Map(window))
    }

    fn unmap_window(&mut self, window: WindowId) -> Result<()> {
        self.record(Call::Unmap(window))
    }

    fn reparent_window(&mut self, window: WindowId, parent: WindowId, pos: Point) -> Result<()> {
        self.record(Call::Reparent(window, parent, pos))
    }

    fn move_resize_window(&mut self, window: WindowId, geometry: Geometry) -> Result<()> {
        self.record(Call::MoveResize(window, geometry))
    }

    fn resize_window(&mut self, window: WindowId, size: Size) -> Result<()> {
        self.record(Call::Resize(window, size))
    }

    fn lower_window(&mut self, window: WindowId) -> Result<()> {
        self.record(Call::Lower(window))
    }

    fn select_input(&mut self, window: WindowId, selection: InputSelection) -> Result<()> {
        self.record(Call::SelectInput(window, selection))
    }

    fn add_to_save_set(&mut self, window: WindowId) -> Result<()> {
        self.record(Call::SaveSetAdd(window))
    }

    fn remove_from_save_set(&mut self, window: WindowId) -> Result<()> {
        self.record(Call::SaveSetRemove(window))
    }

    fn send_configure_notify(&mut self, window: WindowId, geometry: Geometry) -> Result<()> {
        self.record(Call::ConfigureNotify(window, geometry))
    }

    fn set_mapping_state(&mut self, window: WindowId, state: MappingState) -> Result<()> {
        self.record(Call::MappingState(window, state))
    }

    fn set_net_state(&mut self, window: WindowId, state: NetState, mask: NetState) -> Result<()> {
        self.record(Call::NetState(window, state, mask))
    }

    fn set_desktop(&mut self, window: WindowId, desktop: Option<Desktop>) -> Result<()> {
        self.record(Call::Desktop(window, desktop))
    }

    fn set_allowed_actions(&mut self, window: WindowId, actions: AllowedActions) -> Result<()> {
        self.record(Call::AllowedActions(window, actions))
    }

    fn set_frame_extents(&mut self, window: WindowId, insets: BorderInsets) -> Result<()> {
        self.record(Call::FrameExtents(window, insets))
    }

    fn set_visible_name(&mut self, window: WindowId, name: Option<&str>) -> Result<()> {
        self.record(Call::VisibleName(window, name.map(str::to_string)))
    }

    fn set_visible_icon_name(&mut self, window: WindowId, name: Option<&str>) -> Result<()> {
        self.record(Call::VisibleIconName(window, name.map(str::to_string)))
    }

    fn send_message(&mut self, window: WindowId, message: ProtocolMessage, timestamp: Timestamp) -> Result<()> {
        self.record(Call::Message(window, message, timestamp))
    }

    fn set_input_focus(&mut self, window: WindowId, timestamp: Timestamp) -> Result<()> {
        self.record(Call::InputFocus(window, timestamp))
    }

    fn kill_client(&mut self, window: WindowId) -> Result<()> {
        self.record(Call::KillClient(window))
    }

    fn set_bounding_shape(&mut self, window: WindowId, rects: Option<&[Geometry]>) -> Result<()> {
        self.record(Call::BoundingShape(window, rects.map(<[Geometry]>::to_vec)))
    }

    fn copy_bounding_shape(&mut self, window: WindowId, source: WindowId, offset: Point) -> Result<()> {
        self.record(Call::CopyShape(window, source, offset))
    }

    fn grab_server(&mut self) -> Result<()> {
        self.record(Call::Grab)
    }

    fn ungrab_server(&mut self) -> Result<()> {
        self.record(Call::Ungrab)
    }

    fn sync(&mut self) -> Result<()> {
        self.record(Call::Sync)
    }

    fn read_geometry(&self, window: WindowId) -> Option<Geometry> {
        self.fixture(window).and_then(|w| w.geometry)
    }

    fn read_protocols(&self, window: WindowId) -> Protocols {
        self.fixture(window).map(|w| w.protocols).unwrap_or_default()
    }

    fn read_wm_hints(&self, window: WindowId) -> WmHints {
        self.fixture(window).map(|w| w.wm_hints).unwrap_or_default()
    }

    fn read_gravity(&self, window: WindowId) -> Gravity {
        self.fixture(window).map(|w| w.gravity).unwrap_or_default()
    }

    fn read_motif_hints(&self, window: WindowId) -> MotifHints {
        self.fixture(window).map(|w| w.motif).unwrap_or_default()
    }

    fn read_name(&self, window: WindowId) -> String {
        self.fixture(window).map(|w| w.name.clone()).unwrap_or_default()
    }

    fn read_icon_name(&self, window: WindowId) -> String {
        self.fixture(window).map(|w| w.icon_name.clone()).unwrap_or_default()
    }

    fn read_class(&self, window: WindowId) -> ResourceClass {
        self.fixture(window).map(|w| w.class.clone()).unwrap_or_default()
    }

    fn read_pid(&self, window: WindowId) -> Option<u32> {
        self.fixture(window).and_then(|w| w.pid)
    }

    fn read_client_machine(&self, window: WindowId) -> Option<String> {
        self.fixture(window).and_then(|w| w.client_machine.clone())
    }

    fn read_client_leader(&self, window: WindowId) -> Option<WindowId> {
        self.fixture(window).and_then(|w| w.client_leader)
    }

    fn read_transient_for(&self, window: WindowId) -> Option<WindowId> {
        self.fixture(window).and_then(|w| w.transient_for)
    }

    fn read_window_type(&self, window: WindowId) -> WindowType {
        self.fixture(window).map(|w| w.window_type).unwrap_or_default()
    }

    fn read_desktop(&self, window: WindowId) -> Option<Desktop> {
        self.fixture(window).and_then(|w| w.desktop)
    }

    fn read_net_state(&self, window: WindowId) -> NetState {
        self.fixture(window).map(|w| w.net_state).unwrap_or_default()
    }

    fn has_shape(&self, window: WindowId) -> bool {
        self.fixture(window).map(|w| w.has_shape).unwrap_or(false)
    }
}

/// Notification received by a [`FakeDecoration`]
#[derive(Debug, Clone, PartialEq)]
pub enum DecoEvent {
    Resize(Size),
    Show,
    Hide,
    Caption(String),
    Shade(bool),
    Active(bool),
    Desktop(Desktop),
    Destroyed(WindowId),
}

/// Decoration whose insets tests can change under its feet
pub struct FakeDecoration {
    surface: WindowId,
    insets: Rc<Cell<BorderInsets>>,
    shaded_insets: Rc<Cell<BorderInsets>>,
    log: Rc<RefCell<Vec<DecoEvent>>>,
}

impl Decoration for FakeDecoration {
    fn surface(&self) -> WindowId {
        self.surface
    }

    fn borders(&self, shaded: bool) -> BorderInsets {
        if shaded {
            self.shaded_insets.get()
        } else {
            self.insets.get()
        }
    }

    fn resize(&mut self, _server: &mut dyn WindowServer, size: Size) -> Result<()> {
        self.log.borrow_mut().push(DecoEvent::Resize(size));
        Ok(())
    }

    fn show(&mut self, _server: &mut dyn WindowServer) -> Result<()> {
        self.log.borrow_mut().push(DecoEvent::Show);
        Ok(())
    }

    fn hide(&mut self, _server: &mut dyn WindowServer) -> Result<()> {
        self.log.borrow_mut().push(DecoEvent::Hide);
        Ok(())
    }

    fn caption_change(&mut self, caption: &str) {
        self.log.borrow_mut().push(DecoEvent::Caption(caption.to_string()));
    }

    fn shade_change(&mut self, shaded: bool) {
        self.log.borrow_mut().push(DecoEvent::Shade(shaded));
    }

    fn active_change(&mut self, active: bool) {
        self.log.borrow_mut().push(DecoEvent::Active(active));
    }

    fn desktop_change(&mut self, desktop: Desktop) {
        self.log.borrow_mut().push(DecoEvent::Desktop(desktop));
    }

    fn destroy(self: Box<Self>, server: &mut dyn WindowServer) -> Result<()> {
        self.log.borrow_mut().push(DecoEvent::Destroyed(self.surface));
        server.destroy_window(self.surface)
    }
}

/// Builds [`FakeDecoration`]s sharing one set of insets and one log
#[derive(Clone)]
pub struct FakeDecorationFactory {
    pub insets: Rc<Cell<BorderInsets>>,
    pub shaded_insets: Rc<Cell<BorderInsets>>,
    pub log: Rc<RefCell<Vec<DecoEvent>>>,
    pub created: Rc<Cell<usize>>,
}

impl FakeDecorationFactory {
    pub fn new(insets: BorderInsets) -> Self {
        let shaded = BorderInsets { bottom: 0, ..insets };
        Self {
            insets: Rc::new(Cell::new(insets)),
            shaded_insets: Rc::new(Cell::new(shaded)),
            log: Rc::new(RefCell::new(Vec::new())),
            created: Rc::new(Cell::new(0)),
        }
    }

    pub fn events(&self) -> Vec<DecoEvent> {
        self.log.borrow().clone()
    }

    pub fn set_insets(&self, insets: BorderInsets) {
        self.insets.set(insets);
    }
}

impl DecorationFactory for FakeDecorationFactory {
    fn create(&self, server: &mut dyn WindowServer, root: WindowId) -> Result<Box<dyn Decoration>> {
        let surface = server.create_container(root, Geometry::new(0, 0, 1, 1), None)?;
        self.created.set(self.created.get() + 1);
        Ok(Box::new(FakeDecoration {
            surface,
            insets: Rc::clone(&self.insets),
            shaded_insets: Rc::clone(&self.shaded_insets),
            log: Rc::clone(&self.log),
        }))
    }
}

/// One recorded workspace hook
#[derive(Debug, Clone, PartialEq)]
pub enum WsCall {
    ClientHidden(WindowId),
    RemoveClient(WindowId),
    ShouldGetFocus(WindowId),
    Raise(WindowId),
    TakeActivity(WindowId, Timestamp, ActivityFlags),
    ActivateNext(WindowId),
    FocusToNull,
    RequestFocus(WindowId),
}

pub struct FakeWorkspace {
    pub factory: Option<FakeDecorationFactory>,
    pub current_desktop: u32,
    pub desktops: u32,
    pub area: Geometry,
    pub calls: Vec<WsCall>,
}

impl FakeWorkspace {
    pub fn new() -> Self {
        Self {
            factory: Some(FakeDecorationFactory::new(BorderInsets::new(4, 4, 20, 4))),
            current_desktop: 1,
            desktops: 4,
            area: Geometry::new(0, 0, 1920, 1080),
            calls: Vec::new(),
        }
    }
}

impl Workspace for FakeWorkspace {
    fn decoration_factory(&self) -> Option<&dyn DecorationFactory> {
        self.factory.as_ref().map(|f| f as &dyn DecorationFactory)
    }

    fn root_window(&self) -> WindowId {
        ROOT
    }

    fn current_desktop(&self) -> u32 {
        self.current_desktop
    }

    fn number_of_desktops(&self) -> u32 {
        self.desktops
    }

    fn full_area(&self) -> Geometry {
        self.area
    }

    fn client_hidden(&mut self, window: WindowId) {
        self.calls.push(WsCall::ClientHidden(window));
    }

    fn remove_client(&mut self, window: WindowId) {
        self.calls.push(WsCall::RemoveClient(window));
    }

    fn set_should_get_focus(&mut self, window: WindowId) {
        self.calls.push(WsCall::ShouldGetFocus(window));
    }

    fn raise_client(&mut self, window: WindowId, _frame: WindowId) {
        self.calls.push(WsCall::Raise(window));
    }

    fn send_take_activity(&mut self, window: WindowId, timestamp: Timestamp, flags: ActivityFlags) {
        self.calls.push(WsCall::TakeActivity(window, timestamp, flags));
    }

    fn activate_next_client(&mut self, window: WindowId) {
        self.calls.push(WsCall::ActivateNext(window));
    }

    fn focus_to_null(&mut self) {
        self.calls.push(WsCall::FocusToNull);
    }

    fn request_focus(&mut self, window: WindowId) {
        self.calls.push(WsCall::RequestFocus(window));
    }
}

/// Scheduler that only records; tests deliver completions by hand
#[derive(Default)]
pub struct FakeScheduler {
    pub armed: Vec<(TimerId, WindowId, Timestamp, Duration)>,
    pub active_timers: HashSet<TimerId>,
    pub tracked: Vec<(ProcessId, WindowId, Invocation)>,
    pub terminated: Vec<ProcessId>,
    pub detached: Vec<Invocation>,
    pub signalled: Vec<u32>,
    pub fail_spawn: bool,
    next_id: u64,
}

impl FakeScheduler {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl Scheduler for FakeScheduler {
    fn arm_ping_timer(&mut self, window: WindowId, timestamp: Timestamp, after: Duration) -> TimerId {
        let timer = TimerId(self.next_id());
        self.armed.push((timer, window, timestamp, after));
        self.active_timers.insert(timer);
        timer
    }

    fn cancel_timer(&mut self, timer: TimerId) {
        self.active_timers.remove(&timer);
    }

    fn spawn_tracked(&mut self, window: WindowId, invocation: &Invocation) -> Result<ProcessId> {
        if self.fail_spawn {
            return Err(anyhow!("spawn failed"));
        }
        let process = ProcessId(self.next_id());
        self.tracked.push((process, window, invocation.clone()));
        Ok(process)
    }

    fn terminate(&mut self, process: ProcessId) {
        self.terminated.push(process);
    }

    fn spawn_detached(&mut self, invocation: &Invocation) -> Result<()> {
        if self.fail_spawn {
            return Err(anyhow!("spawn failed"));
        }
        self.detached.push(invocation.clone());
        Ok(())
    }

    fn terminate_pid(&mut self, pid: u32) -> Result<()> {
        self.signalled.push(pid);
        Ok(())
    }
}

/// Virtual time that moves forward by `step` on every read
pub struct StepClock {
    now: Cell<Instant>,
    step: Duration,
    pub reads: Cell<usize>,
}

impl StepClock {
    pub fn new(step: Duration) -> Self {
        Self {
            now: Cell::new(Instant::now()),
            step,
            reads: Cell::new(0),
        }
    }
}

impl Clock for StepClock {
    fn now(&self) -> Instant {
        let now = self.now.get();
        self.now.set(now + self.step);
        self.reads.set(self.reads.get() + 1);
        now
    }
}

/// Everything a [`Context`] borrows, owned in one place
pub struct TestEnv {
    pub server: FakeServer,
    pub workspace: FakeWorkspace,
    pub scheduler: FakeScheduler,
    pub clock: StepClock,
    pub config: Config,
    pub timestamp: Timestamp,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            server: FakeServer::new(),
            workspace: FakeWorkspace::new(),
            scheduler: FakeScheduler::default(),
            clock: StepClock::new(Duration::from_millis(20)),
            config: Config::default(),
            timestamp: 1000,
        }
    }

    pub fn ctx(&mut self) -> Context<'_> {
        Context {
            server: &mut self.server,
            workspace: &mut self.workspace,
            scheduler: &mut self.scheduler,
            clock: &self.clock,
            config: &self.config,
            timestamp: self.timestamp,
        }
    }

    pub fn factory(&self) -> FakeDecorationFactory {
        self.workspace
            .factory
            .clone()
            .unwrap_or_else(|| FakeDecorationFactory::new(BorderInsets::default()))
    }

    pub fn deco_events(&self) -> Vec<DecoEvent> {
        self.factory().events()
    }
}
