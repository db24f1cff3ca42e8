//! Button inputs and the click-detection state machine.
//!
//! Events can reach a button three ways:
//!
//! 1. Raw [`ButtonInput::press`] / [`ButtonInput::release`] feed the
//!    built-in [`ClickDetector`], which resolves timing patterns
//!    (clicks, multi-clicks, holds, short-long combos) and pushes the
//!    resulting click event.
//! 2. [`ButtonInput::update_click`] reports an already-resolved click
//!    type, bypassing the detector.
//! 3. [`ButtonInput::update_action`] reports a direct scene call; the
//!    state then takes the action shape (`actionId`/`actionMode`)
//!    instead of the click shape (`value`/`clickType`).
//!
//! Button state pushes are never throttled.

use std::time::Duration;

use log::{debug, warn};
use tokio::time::Instant;

use dsvdc_proto::{DsUid, Message, PropTree, PropValue, tree_to_elements};

use crate::context::{ClickTimerKind, HostContext, InputKind, InputPath, TimerEvent, TimerHandle};
use crate::enums::{
    ActionMode, ButtonClickType, ButtonElementId, ButtonFunction, ButtonMode, ButtonType,
    InputError,
};
use crate::macros::with;
use crate::persist::ButtonInputRecord;
use crate::session::SessionHandle;

/// Maximum press duration that still counts as a short press.
pub const DEFAULT_TIP_TIMEOUT: Duration = Duration::from_millis(250);
/// Maximum gap between short presses of one multi-click sequence.
pub const DEFAULT_MULTI_CLICK_WINDOW: Duration = Duration::from_millis(300);
/// Interval between `HOLD_REPEAT` events while the button is held.
pub const DEFAULT_HOLD_REPEAT_INTERVAL: Duration = Duration::from_secs(1);

/// Standard element layout per button type.
pub fn required_elements(button_type: ButtonType) -> &'static [ButtonElementId] {
    use ButtonElementId::*;
    match button_type {
        ButtonType::SinglePushbutton => &[Center],
        ButtonType::TwoWayPushbutton | ButtonType::OnOffSwitch => &[Down, Up],
        ButtonType::FourWayNavigation => &[Down, Up, Left, Right],
        ButtonType::FourWayWithCenter => &[Center, Down, Up, Left, Right],
        ButtonType::EightWayWithCenter => &[
            Center, Down, Up, Left, Right, UpperLeft, LowerLeft, UpperRight, LowerRight,
        ],
        ButtonType::Undefined => &[],
    }
}

/// Timing configuration for a [`ClickDetector`].
#[derive(Debug, Clone, Copy)]
pub struct ClickDetectorConfig {
    pub tip_timeout: Duration,
    pub multi_click_window: Duration,
    pub hold_repeat_interval: Duration,
    /// Emit `TIP_Nx` instead of `CLICK_Nx` for resolved short presses.
    pub use_tip_events: bool,
}

impl Default for ClickDetectorConfig {
    fn default() -> Self {
        Self {
            tip_timeout: DEFAULT_TIP_TIMEOUT,
            multi_click_window: DEFAULT_MULTI_CLICK_WINDOW,
            hold_repeat_interval: DEFAULT_HOLD_REPEAT_INTERVAL,
            use_tip_events: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClickState {
    Idle,
    Pressed,
    TipWait,
    Holding,
}

/// Resolves raw press/release events into click events.
///
/// Transitions (timers are scheduled through the host context and
/// re-enter via [`ClickDetector::on_timer`]):
///
/// ```text
/// IDLE     --press-->                PRESSED    (start tip timer)
/// PRESSED  --release-->              TIP_WAIT   (tip_count++, start multi-click timer)
/// PRESSED  --tip timer-->            HOLDING    (emit HOLD_START / SHORT_LONG /
///                                                SHORT_SHORT_LONG, start repeat timer)
/// TIP_WAIT --press-->                PRESSED    (restart tip timer)
/// TIP_WAIT --multi-click timer-->    IDLE       (emit CLICK_Nx / TIP_Nx)
/// HOLDING  --repeat timer-->         HOLDING    (emit HOLD_REPEAT, restart)
/// HOLDING  --release-->              IDLE       (emit HOLD_END)
/// ```
#[derive(Debug)]
pub struct ClickDetector {
    config: ClickDetectorConfig,
    state: ClickState,
    tip_count: u32,
    tip_timer: Option<TimerHandle>,
    multi_click_timer: Option<TimerHandle>,
    hold_repeat_timer: Option<TimerHandle>,
}

impl ClickDetector {
    pub fn new(config: ClickDetectorConfig) -> Self {
        Self {
            config,
            state: ClickState::Idle,
            tip_count: 0,
            tip_timer: None,
            multi_click_timer: None,
            hold_repeat_timer: None,
        }
    }

    pub fn tip_count(&self) -> u32 {
        self.tip_count
    }

    /// Physical button-down. Ignored while already pressed.
    fn press(&mut self, ctx: &HostContext, path: &InputPath) {
        match self.state {
            ClickState::Idle => {
                self.tip_count = 0;
                self.state = ClickState::Pressed;
                self.schedule_tip(ctx, path);
            }
            ClickState::TipWait => {
                self.multi_click_timer = None;
                self.state = ClickState::Pressed;
                self.schedule_tip(ctx, path);
            }
            ClickState::Pressed | ClickState::Holding => {}
        }
    }

    /// Physical button-up. Returns an event to emit, if any.
    fn release(&mut self, ctx: &HostContext, path: &InputPath) -> Option<(ButtonClickType, bool)> {
        match self.state {
            ClickState::Pressed => {
                self.tip_timer = None;
                self.tip_count += 1;
                self.state = ClickState::TipWait;
                self.multi_click_timer = Some(ctx.spawn_timer(
                    self.config.multi_click_window,
                    TimerEvent::Click(path.clone(), ClickTimerKind::MultiClick),
                ));
                None
            }
            ClickState::Holding => {
                self.hold_repeat_timer = None;
                self.state = ClickState::Idle;
                self.tip_count = 0;
                Some((ButtonClickType::HoldEnd, false))
            }
            ClickState::Idle | ClickState::TipWait => None,
        }
    }

    /// A scheduled timer fired. Returns an event to emit, if any.
    fn on_timer(
        &mut self,
        ctx: &HostContext,
        path: &InputPath,
        kind: ClickTimerKind,
    ) -> Option<(ButtonClickType, bool)> {
        match kind {
            ClickTimerKind::Tip => {
                if self.state != ClickState::Pressed {
                    return None;
                }
                self.state = ClickState::Holding;
                self.schedule_hold_repeat(ctx, path);
                let event = match self.tip_count {
                    0 => ButtonClickType::HoldStart,
                    1 => ButtonClickType::ShortLong,
                    _ => ButtonClickType::ShortShortLong,
                };
                Some((event, true))
            }
            ClickTimerKind::MultiClick => {
                if self.state != ClickState::TipWait {
                    return None;
                }
                self.state = ClickState::Idle;
                let event = if self.config.use_tip_events {
                    match self.tip_count {
                        1 => ButtonClickType::Tip1x,
                        2 => ButtonClickType::Tip2x,
                        3 => ButtonClickType::Tip3x,
                        _ => ButtonClickType::Tip4x,
                    }
                } else {
                    match self.tip_count {
                        1 => ButtonClickType::Click1x,
                        2 => ButtonClickType::Click2x,
                        _ => ButtonClickType::Click3x,
                    }
                };
                self.tip_count = 0;
                Some((event, false))
            }
            ClickTimerKind::HoldRepeat => {
                if self.state != ClickState::Holding {
                    return None;
                }
                self.schedule_hold_repeat(ctx, path);
                Some((ButtonClickType::HoldRepeat, true))
            }
        }
    }

    /// Cancel all timers and return to idle (vanish, disconnect,
    /// removal).
    fn stop(&mut self) {
        self.tip_timer = None;
        self.multi_click_timer = None;
        self.hold_repeat_timer = None;
        self.state = ClickState::Idle;
        self.tip_count = 0;
    }

    fn schedule_tip(&mut self, ctx: &HostContext, path: &InputPath) {
        self.tip_timer = Some(ctx.spawn_timer(
            self.config.tip_timeout,
            TimerEvent::Click(path.clone(), ClickTimerKind::Tip),
        ));
    }

    fn schedule_hold_repeat(&mut self, ctx: &HostContext, path: &InputPath) {
        self.hold_repeat_timer = Some(ctx.spawn_timer(
            self.config.hold_repeat_interval,
            TimerEvent::Click(path.clone(), ClickTimerKind::HoldRepeat),
        ));
    }
}

pub struct ButtonInput {
    ctx: HostContext,
    ds_index: u8,
    // Description (read-only, persisted).
    name: String,
    supports_local_key_mode: bool,
    button_id: Option<i64>,
    button_type: ButtonType,
    button_element_id: ButtonElementId,
    // Settings (writable, persisted).
    group: i64,
    function: ButtonFunction,
    mode: ButtonMode,
    channel: i64,
    sets_local_priority: bool,
    calls_present: bool,
    // State (volatile). The most recent event selects the shape:
    // click (value/clickType) or action (actionId/actionMode).
    value: Option<bool>,
    click_type: ButtonClickType,
    action_id: Option<i64>,
    action_mode: Option<ActionMode>,
    error: InputError,
    last_update: Option<Instant>,
    last_is_action: bool,
    detector: ClickDetector,
    // Set while attached / announced.
    path: Option<InputPath>,
    session: Option<SessionHandle>,
}

impl ButtonInput {
    pub fn new(ctx: &HostContext, ds_index: u8) -> Self {
        Self {
            ctx: ctx.clone(),
            ds_index,
            name: String::new(),
            supports_local_key_mode: false,
            button_id: None,
            button_type: ButtonType::Undefined,
            button_element_id: ButtonElementId::Center,
            group: 0,
            function: ButtonFunction::Device,
            mode: ButtonMode::Standard,
            channel: 0,
            sets_local_priority: false,
            calls_present: false,
            value: None,
            click_type: ButtonClickType::Idle,
            action_id: None,
            action_mode: None,
            error: InputError::Ok,
            last_update: None,
            last_is_action: false,
            detector: ClickDetector::new(ClickDetectorConfig::default()),
            path: None,
            session: None,
        }
    }

    with!(supports_local_key_mode, bool);
    with!(button_id, Option<i64>);
    with!(button_type, ButtonType);
    with!(button_element_id, ButtonElementId);
    with!(group, i64);
    with!(function, ButtonFunction);
    with!(mode, ButtonMode);
    with!(channel, i64);
    with!(sets_local_priority, bool);
    with!(calls_present, bool);

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_click_detector(mut self, config: ClickDetectorConfig) -> Self {
        self.detector = ClickDetector::new(config);
        self
    }

    pub fn ds_index(&self) -> u8 {
        self.ds_index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn button_type(&self) -> ButtonType {
        self.button_type
    }

    pub fn button_element_id(&self) -> ButtonElementId {
        self.button_element_id
    }

    pub fn value(&self) -> Option<bool> {
        self.value
    }

    pub fn click_type(&self) -> ButtonClickType {
        self.click_type
    }

    pub fn action_id(&self) -> Option<i64> {
        self.action_id
    }

    pub fn error(&self) -> InputError {
        self.error
    }

    pub fn age(&self) -> Option<f64> {
        self.last_update
            .map(|at| Instant::now().duration_since(at).as_secs_f64())
    }

    pub fn detector(&self) -> &ClickDetector {
        &self.detector
    }

    // ---- raw press/release (state machine mode) ----------------------

    /// Physical button-down; feeds the click detector. The boolean
    /// state is updated immediately so property reads reflect it.
    pub fn press(&mut self) {
        self.value = Some(true);
        let Some(path) = self.path.clone() else {
            warn!("buttonInput[{}]: press before attach", self.ds_index);
            return;
        };
        let ctx = self.ctx.clone();
        self.detector.press(&ctx, &path);
    }

    /// Physical button-up; feeds the click detector.
    pub async fn release(&mut self) {
        self.value = Some(false);
        let Some(path) = self.path.clone() else {
            warn!("buttonInput[{}]: release before attach", self.ds_index);
            return;
        };
        let ctx = self.ctx.clone();
        if let Some((click, value)) = self.detector.release(&ctx, &path) {
            self.apply_click(click, value).await;
        }
    }

    /// A click-detector timer fired (called via the host context).
    pub(crate) async fn on_click_timer(&mut self, kind: ClickTimerKind) {
        let Some(path) = self.path.clone() else {
            return;
        };
        let ctx = self.ctx.clone();
        if let Some((click, value)) = self.detector.on_timer(&ctx, &path, kind) {
            self.apply_click(click, value).await;
        }
    }

    async fn apply_click(&mut self, click: ButtonClickType, value: bool) {
        self.click_type = click;
        self.value = Some(value);
        self.last_update = Some(Instant::now());
        self.last_is_action = false;
        debug!(
            "buttonInput[{}] click resolved: {click:?} (value={value})",
            self.ds_index
        );
        self.push_state().await;
    }

    // ---- direct updates ----------------------------------------------

    /// Report an already-resolved click event, bypassing the detector.
    pub async fn update_click(&mut self, click: ButtonClickType, value: Option<bool>) {
        self.click_type = click;
        if let Some(value) = value {
            self.value = Some(value);
        }
        self.last_update = Some(Instant::now());
        self.last_is_action = false;
        debug!("buttonInput[{}] clickType -> {click:?}", self.ds_index);
        self.push_state().await;
    }

    /// Report a direct scene call; switches the state to the action
    /// shape.
    pub async fn update_action(&mut self, action_id: i64, action_mode: ActionMode) {
        self.action_id = Some(action_id);
        self.action_mode = Some(action_mode);
        self.last_update = Some(Instant::now());
        self.last_is_action = true;
        debug!(
            "buttonInput[{}] actionId -> {action_id} (mode={action_mode:?})",
            self.ds_index
        );
        self.push_state().await;
    }

    pub async fn update_error(&mut self, error: InputError) {
        self.error = error;
        debug!("buttonInput[{}] error -> {error:?}", self.ds_index);
        self.push_state().await;
    }

    // ---- push (unthrottled) ------------------------------------------

    async fn push_state(&mut self) {
        let Some(session) = self.session.clone() else {
            return;
        };
        let Some(path) = self.path.clone() else {
            return;
        };
        let mut states = PropTree::new();
        states.insert(self.ds_index.to_string(), self.state_props().into());
        let mut tree = PropTree::new();
        tree.insert("buttonInputStates".into(), states.into());

        let msg = Message::push_property(&path.vdsd.to_string(), tree_to_elements(&tree));
        if let Err(err) = session.send_notification(msg).await {
            warn!("buttonInput[{}]: failed to push state: {err}", self.ds_index);
        }
    }

    // ---- lifecycle ---------------------------------------------------

    pub(crate) fn attach(&mut self, vdsd_dsuid: &DsUid) {
        self.path = Some(InputPath {
            vdsd: *vdsd_dsuid,
            kind: InputKind::Button,
            index: self.ds_index,
        });
    }

    pub(crate) fn start_session(&mut self, session: SessionHandle) {
        self.session = Some(session);
    }

    pub(crate) fn stop_session(&mut self) {
        self.detector.stop();
        self.session = None;
    }

    // ---- property dicts ----------------------------------------------

    /// `buttonInputDescriptions[N]` property dict.
    pub fn description_props(&self) -> PropTree {
        let mut tree = PropTree::new();
        tree.insert("name".into(), self.name.clone().into());
        tree.insert("dsIndex".into(), PropValue::Int(self.ds_index as i64));
        tree.insert(
            "supportsLocalKeyMode".into(),
            self.supports_local_key_mode.into(),
        );
        tree.insert("buttonType".into(), PropValue::Int(self.button_type.into()));
        tree.insert(
            "buttonElementID".into(),
            PropValue::Int(self.button_element_id.into()),
        );
        if let Some(button_id) = self.button_id {
            tree.insert("buttonID".into(), PropValue::Int(button_id));
        }
        tree
    }

    /// `buttonInputSettings[N]` property dict.
    pub fn settings_props(&self) -> PropTree {
        let mut tree = PropTree::new();
        tree.insert("group".into(), PropValue::Int(self.group));
        tree.insert("function".into(), PropValue::Int(self.function.into()));
        tree.insert("mode".into(), PropValue::Int(self.mode.into()));
        tree.insert("channel".into(), PropValue::Int(self.channel));
        tree.insert(
            "setsLocalPriority".into(),
            self.sets_local_priority.into(),
        );
        tree.insert("callsPresent".into(), self.calls_present.into());
        tree
    }

    /// `buttonInputStates[N]` property dict; shape depends on the
    /// most recent event kind.
    pub fn state_props(&self) -> PropTree {
        let mut tree = PropTree::new();
        if self.last_is_action {
            tree.insert("actionId".into(), self.action_id.into());
            tree.insert(
                "actionMode".into(),
                PropValue::Int(self.action_mode.unwrap_or(ActionMode::Normal).into()),
            );
        } else {
            tree.insert("value".into(), self.value.into());
            tree.insert("clickType".into(), PropValue::Int(self.click_type.into()));
        }
        tree.insert("age".into(), self.age().into());
        tree.insert("error".into(), PropValue::Int(self.error.into()));
        tree
    }

    /// Apply writable settings; unknown keys are ignored.
    pub(crate) fn apply_settings(&mut self, incoming: &PropTree) {
        let mut changed = false;
        if let Some(v) = incoming.get("group").and_then(PropValue::as_i64) {
            self.group = v;
            changed = true;
        }
        if let Some(v) = incoming.get("function").and_then(PropValue::as_i64) {
            if let Some(function) = ButtonFunction::from_i64(v) {
                self.function = function;
                changed = true;
            }
        }
        if let Some(v) = incoming.get("mode").and_then(PropValue::as_i64) {
            if let Some(mode) = ButtonMode::from_i64(v) {
                self.mode = mode;
                changed = true;
            }
        }
        if let Some(v) = incoming.get("channel").and_then(PropValue::as_i64) {
            self.channel = v;
            changed = true;
        }
        if let Some(v) = incoming
            .get("setsLocalPriority")
            .and_then(PropValue::as_bool)
        {
            self.sets_local_priority = v;
            changed = true;
        }
        if let Some(v) = incoming.get("callsPresent").and_then(PropValue::as_bool) {
            self.calls_present = v;
            changed = true;
        }
        if changed {
            self.ctx.schedule_save();
        }
    }

    // ---- persistence -------------------------------------------------

    pub(crate) fn to_record(&self) -> ButtonInputRecord {
        ButtonInputRecord {
            ds_index: self.ds_index,
            name: self.name.clone(),
            supports_local_key_mode: self.supports_local_key_mode,
            button_id: self.button_id,
            button_type: self.button_type.into(),
            button_element_id: self.button_element_id.into(),
            group: self.group,
            function: self.function.into(),
            mode: self.mode.into(),
            channel: self.channel,
            sets_local_priority: self.sets_local_priority,
            calls_present: self.calls_present,
        }
    }

    pub(crate) fn from_record(ctx: &HostContext, record: &ButtonInputRecord) -> Self {
        let mut button = Self::new(ctx, record.ds_index)
            .with_name(&record.name)
            .with_supports_local_key_mode(record.supports_local_key_mode)
            .with_button_type(
                ButtonType::from_i64(record.button_type).unwrap_or(ButtonType::Undefined),
            )
            .with_button_element_id(
                ButtonElementId::from_i64(record.button_element_id)
                    .unwrap_or(ButtonElementId::Center),
            )
            .with_group(record.group)
            .with_function(
                ButtonFunction::from_i64(record.function).unwrap_or(ButtonFunction::Device),
            )
            .with_mode(ButtonMode::from_i64(record.mode).unwrap_or(ButtonMode::Standard))
            .with_channel(record.channel)
            .with_sets_local_priority(record.sets_local_priority)
            .with_calls_present(record.calls_present);
        button.button_id = record.button_id;
        button
    }
}

/// Create all elements of a multi-contact button. Every element
/// shares `button_id`; dsIndices are assigned from `start_index`.
pub fn button_group(
    ctx: &HostContext,
    button_id: i64,
    button_type: ButtonType,
    start_index: u8,
    name_prefix: &str,
) -> Result<Vec<ButtonInput>, crate::error::HostError> {
    let elements = required_elements(button_type);
    if elements.is_empty() {
        return Err(crate::error::HostError::InvalidConfiguration(format!(
            "{button_type:?} has no standard element layout"
        )));
    }
    Ok(elements
        .iter()
        .enumerate()
        .map(|(offset, element)| {
            ButtonInput::new(ctx, start_index + offset as u8)
                .with_name(&format!("{name_prefix} {element:?}"))
                .with_button_id(button_id)
                .with_button_type(button_type)
                .with_button_element_id(*element)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SaveScheduler;
    use dsvdc_proto::dsuid::namespace;
    use std::sync::Weak;

    fn test_ctx() -> HostContext {
        HostContext::new(Weak::new(), SaveScheduler::new(None, Duration::from_secs(1)))
    }

    fn attached_button() -> ButtonInput {
        let mut btn = ButtonInput::new(&test_ctx(), 0)
            .with_button_type(ButtonType::SinglePushbutton);
        btn.attach(&DsUid::from_name_in_space("btn-dev", &namespace::VDC));
        btn
    }

    async fn fire(btn: &mut ButtonInput, kind: ClickTimerKind) {
        btn.on_click_timer(kind).await;
    }

    #[tokio::test(start_paused = true)]
    async fn single_click_resolves_after_window() {
        let mut btn = attached_button();
        btn.press();
        btn.release().await;
        assert_eq!(btn.detector().tip_count(), 1);
        fire(&mut btn, ClickTimerKind::MultiClick).await;
        assert_eq!(btn.click_type(), ButtonClickType::Click1x);
        assert_eq!(btn.value(), Some(false));
    }

    #[tokio::test(start_paused = true)]
    async fn double_click_counts_tips() {
        let mut btn = attached_button();
        btn.press();
        btn.release().await;
        btn.press();
        btn.release().await;
        fire(&mut btn, ClickTimerKind::MultiClick).await;
        assert_eq!(btn.click_type(), ButtonClickType::Click2x);
    }

    #[tokio::test(start_paused = true)]
    async fn many_clicks_cap_at_3x() {
        let mut btn = attached_button();
        for _ in 0..5 {
            btn.press();
            btn.release().await;
        }
        fire(&mut btn, ClickTimerKind::MultiClick).await;
        assert_eq!(btn.click_type(), ButtonClickType::Click3x);
    }

    #[tokio::test(start_paused = true)]
    async fn tip_mode_caps_at_4x() {
        let mut btn = ButtonInput::new(&test_ctx(), 0).with_click_detector(ClickDetectorConfig {
            use_tip_events: true,
            ..Default::default()
        });
        btn.attach(&DsUid::from_name_in_space("btn-dev", &namespace::VDC));
        for _ in 0..6 {
            btn.press();
            btn.release().await;
        }
        fire(&mut btn, ClickTimerKind::MultiClick).await;
        assert_eq!(btn.click_type(), ButtonClickType::Tip4x);
    }

    #[tokio::test(start_paused = true)]
    async fn hold_sequence() {
        let mut btn = attached_button();
        btn.press();
        // Tip timer fires while still pressed -> hold start.
        fire(&mut btn, ClickTimerKind::Tip).await;
        assert_eq!(btn.click_type(), ButtonClickType::HoldStart);
        assert_eq!(btn.value(), Some(true));

        fire(&mut btn, ClickTimerKind::HoldRepeat).await;
        assert_eq!(btn.click_type(), ButtonClickType::HoldRepeat);

        btn.release().await;
        assert_eq!(btn.click_type(), ButtonClickType::HoldEnd);
        assert_eq!(btn.value(), Some(false));
    }

    #[tokio::test(start_paused = true)]
    async fn tap_then_hold_is_short_long() {
        let mut btn = attached_button();
        btn.press();
        btn.release().await;
        btn.press();
        fire(&mut btn, ClickTimerKind::Tip).await;
        assert_eq!(btn.click_type(), ButtonClickType::ShortLong);
    }

    #[tokio::test(start_paused = true)]
    async fn two_taps_then_hold_is_short_short_long() {
        let mut btn = attached_button();
        btn.press();
        btn.release().await;
        btn.press();
        btn.release().await;
        btn.press();
        fire(&mut btn, ClickTimerKind::Tip).await;
        assert_eq!(btn.click_type(), ButtonClickType::ShortShortLong);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_timers_are_ignored() {
        let mut btn = attached_button();
        btn.press();
        btn.release().await;
        // Tip timer firing after release must not start a hold.
        fire(&mut btn, ClickTimerKind::Tip).await;
        assert_eq!(btn.click_type(), ButtonClickType::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn action_shape_replaces_click_shape() {
        let mut btn = attached_button();
        btn.update_click(ButtonClickType::Click1x, Some(false)).await;
        assert!(btn.state_props().contains_key("clickType"));

        btn.update_action(5, ActionMode::Normal).await;
        let state = btn.state_props();
        assert_eq!(state["actionId"], PropValue::Int(5));
        assert!(state.contains_key("actionMode"));
        assert!(!state.contains_key("clickType"));

        btn.update_click(ButtonClickType::Click2x, None).await;
        assert!(btn.state_props().contains_key("clickType"));
    }

    #[tokio::test(start_paused = true)]
    async fn button_group_layout() {
        let buttons = button_group(&test_ctx(), 7, ButtonType::FourWayWithCenter, 0, "Nav")
            .unwrap();
        assert_eq!(buttons.len(), 5);
        assert_eq!(buttons[0].button_element_id(), ButtonElementId::Center);
        assert_eq!(buttons[4].ds_index(), 4);
        assert!(buttons.iter().all(|b| b.button_id == Some(7)));

        assert!(button_group(&test_ctx(), 0, ButtonType::Undefined, 0, "x").is_err());
    }
}
