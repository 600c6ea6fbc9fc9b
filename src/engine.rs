//! # Command Engine
//!
//! The dispatcher at the heart of the crate: takes one terminator-stripped
//! command line, validates its length bounds, routes it to the registry, the
//! subscription cache or a provider, and produces exactly one reply line,
//! even on rejection. The protocol is strictly request/reply.
//!
//! Handlers never block. Anything long-running (an HTTP fetch, broker
//! traffic) is only *begun* here; its progress arrives later as events
//! applied through [`LinkEngine::http_event`] and [`LinkEngine::mqtt_arrived`]
//! on the same cooperative task.

use core::fmt::Write as _;

use heapless::Vec;

use crate::command::{Command, MNEMONIC_LEN, PASSPHRASE_MAX, SSID_MAX};
use crate::http::{
    HttpEvent, HttpRegistry, Progress, RequestField, TX_CONTENT_MAX, parse_handle,
};
use crate::mqtt::SubscriptionCache;
use crate::params::{LengthCheck, check_length, split_fields};
use crate::provider::{HttpProvider, MqttProvider, WifiProvider};

/// Reply line capacity: the largest response field plus formatting slack.
pub const REPLY_MAX: usize = 560;

/// One reply line, without the terminator.
pub type Reply = Vec<u8, REPLY_MAX>;

const OK: &[u8] = b"S";
const FAILED: &[u8] = b"U";
const MISSING: &[u8] = b"N";

fn token(bytes: &[u8]) -> Reply {
    let mut reply = Reply::new();
    // Cannot fail: tokens are far below the reply capacity.
    let _ = reply.extend_from_slice(bytes);
    reply
}

fn char_reply(code: u8) -> Reply {
    let mut reply = Reply::new();
    let _ = reply.push(code);
    reply
}

/// Adapts a [`Reply`] for `write!`; formatting past the capacity truncates.
struct ReplyWriter<'a>(&'a mut Reply);

impl core::fmt::Write for ReplyWriter<'_> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        self.0
            .extend_from_slice(s.as_bytes())
            .map_err(|_| core::fmt::Error)
    }
}

/// The command protocol engine.
///
/// Owns the HTTP request/response pools and the subscription cache; borrows
/// nothing from callers. `HANDLES` sizes the HTTP pool; `MAX_SUBS` sizes the
/// subscription table and must be a power of two.
pub struct LinkEngine<W, H, M, const HANDLES: usize, const MAX_SUBS: usize> {
    wifi: W,
    http: H,
    mqtt: M,
    requests: HttpRegistry<HANDLES>,
    cache: SubscriptionCache<MAX_SUBS>,
    reset_pending: bool,
}

impl<W, H, M, const HANDLES: usize, const MAX_SUBS: usize> LinkEngine<W, H, M, HANDLES, MAX_SUBS>
where
    W: WifiProvider,
    H: HttpProvider,
    M: MqttProvider,
{
    /// Creates an engine with empty pools.
    pub fn new(wifi: W, http: H, mqtt: M) -> Self {
        Self {
            wifi,
            http,
            mqtt,
            requests: HttpRegistry::new(),
            cache: SubscriptionCache::new(),
            reset_pending: false,
        }
    }

    /// Read access to the HTTP pools, for observation and tests.
    pub fn registry(&self) -> &HttpRegistry<HANDLES> {
        &self.requests
    }

    /// Read access to the subscription cache, for observation and tests.
    pub fn subscriptions(&self) -> &SubscriptionCache<MAX_SUBS> {
        &self.cache
    }

    /// Whether the controller has requested a device reset (`rst`).
    ///
    /// The engine cannot reset hardware; the surrounding system observes this
    /// after dispatch and acts on it.
    pub fn reset_pending(&self) -> bool {
        self.reset_pending
    }

    /// Dispatches one terminator-stripped command line, returning the single
    /// reply line (also without terminator).
    pub fn dispatch(&mut self, line: &[u8]) -> Reply {
        if line.len() < MNEMONIC_LEN {
            return token(b"short");
        }
        let Some(command) = Command::lookup(&line[..MNEMONIC_LEN]) else {
            return token(b"invalid");
        };
        let params: &[u8] = if line.len() == MNEMONIC_LEN {
            &[]
        } else if line[MNEMONIC_LEN] == b' ' {
            &line[MNEMONIC_LEN + 1..]
        } else {
            return token(b"invalid");
        };

        let (min, max) = command.bounds();
        match check_length(params.len(), min, max) {
            LengthCheck::TooShort => return token(b"short"),
            LengthCheck::TooLong => return token(b"long"),
            LengthCheck::Ok => {}
        }

        match command {
            Command::Nop => Reply::new(),
            Command::Ver => token(env!("CARGO_PKG_VERSION").as_bytes()),
            Command::Rst => self.cmd_rst(),
            Command::Lap => self.cmd_lap(),
            Command::Cap => self.cmd_cap(params),
            Command::Sap => char_reply(self.wifi.status().code()),
            Command::Dap => self.cmd_dap(),
            Command::Gip => self.cmd_gip(),
            Command::Ihr => self.cmd_ihr(params),
            Command::Phr => self.cmd_append(RequestField::Parameter, params),
            Command::Chr => self.cmd_append(RequestField::Content, params),
            Command::Hhr => self.cmd_append(RequestField::Header, params),
            Command::Thr => self.cmd_thr(params),
            Command::Shr => self.cmd_shr(params),
            Command::Ghr => self.cmd_ghr(params),
            Command::Dhr => self.cmd_dhr(params),
            Command::Mcg => self.cmd_mcg(params),
            Command::Mic => char_reply(if self.mqtt.is_connected() { b'T' } else { b'F' }),
            Command::Msb => self.cmd_msb(params),
            Command::Mus => self.cmd_mus(params),
            Command::Mua => self.cmd_mua(),
            Command::Mnd => self.cmd_mnd(params),
            Command::Mgs => self.cmd_mgs(params),
            Command::Mpb => self.cmd_mpb(params),
        }
    }

    /// Applies one HTTP lifecycle event to the paired response slot.
    pub fn http_event(&mut self, handle: usize, event: HttpEvent<'_>) {
        self.requests.on_event(handle, event);
    }

    /// Records an arriving MQTT publish in the subscription cache.
    pub fn mqtt_arrived(&mut self, topic: &str, payload: &[u8]) {
        self.cache.on_message(topic, payload);
    }

    fn cmd_rst(&mut self) -> Reply {
        info!("reset requested by controller");
        self.reset_pending = true;
        Reply::new()
    }

    fn cmd_lap(&mut self) -> Reply {
        let mut results = Vec::new();
        if self.wifi.scan(&mut results).is_err() {
            return token(FAILED);
        }
        let mut reply = Reply::new();
        let mut writer = ReplyWriter(&mut reply);
        for (i, entry) in results.iter().enumerate() {
            let _ = write!(
                writer,
                "{}{}:{}:{}:{}",
                if i == 0 { "" } else { "," },
                entry.ssid,
                entry.auth,
                entry.channel,
                entry.rssi
            );
        }
        reply
    }

    fn cmd_cap(&mut self, params: &[u8]) -> Reply {
        let mut fields: Vec<Vec<u8, PASSPHRASE_MAX>, 2> = Vec::new();
        let count = split_fields(params, &mut fields);
        if count == 0 || fields[0].is_empty() || fields[0].len() > SSID_MAX {
            return token(FAILED);
        }
        let passphrase: &[u8] = fields.get(1).map(|f| &f[..]).unwrap_or(&[]);
        match self.wifi.configure(&fields[0], passphrase) {
            Ok(()) => token(OK),
            Err(_) => token(FAILED),
        }
    }

    fn cmd_dap(&mut self) -> Reply {
        match self.wifi.disconnect() {
            Ok(()) => token(OK),
            Err(_) => token(FAILED),
        }
    }

    fn cmd_gip(&mut self) -> Reply {
        let Some([a, b, c, d]) = self.wifi.ip() else {
            return token(FAILED);
        };
        let mut reply = Reply::new();
        let _ = write!(ReplyWriter(&mut reply), "{}.{}.{}.{}", a, b, c, d);
        reply
    }

    fn cmd_ihr(&mut self, params: &[u8]) -> Reply {
        let mut fields: Vec<Vec<u8, TX_CONTENT_MAX>, 2> = Vec::new();
        if split_fields(params, &mut fields) < 2 {
            return token(FAILED);
        }
        let Some(&method) = fields[0].first() else {
            return token(FAILED);
        };
        let Some(handle) = self.requests.allocate() else {
            warn!("http handle pool exhausted");
            return token(FAILED);
        };
        if self.requests.populate(handle, method, &fields[1]).is_err() {
            return token(FAILED);
        }
        let mut reply = Reply::new();
        let _ = write!(ReplyWriter(&mut reply), "{}", handle);
        reply
    }

    fn cmd_append(&mut self, kind: RequestField, params: &[u8]) -> Reply {
        let mut fields: Vec<Vec<u8, TX_CONTENT_MAX>, 2> = Vec::new();
        if split_fields(params, &mut fields) < 2 {
            return token(FAILED);
        }
        let Some(handle) = parse_handle(&fields[0], HANDLES) else {
            return token(FAILED);
        };
        match self.requests.append_field(kind, handle, &fields[1]) {
            Ok(()) => token(OK),
            Err(_) => token(FAILED),
        }
    }

    fn cmd_thr(&mut self, params: &[u8]) -> Reply {
        let Some(handle) = parse_handle(params, HANDLES) else {
            return token(FAILED);
        };
        if !self.requests.is_in_use(handle) {
            return token(FAILED);
        }
        // Refuse re-fire until the in-flight operation reaches a terminal
        // state; the controller must wait or wait for purge eligibility.
        if self.requests.poll(handle) == Progress::InProgress {
            return token(FAILED);
        }
        self.requests.reset_response(handle);
        let Some(parts) = self.requests.request_parts(handle) else {
            return token(FAILED);
        };
        match self.http.begin(handle, parts) {
            Ok(()) => Reply::new(),
            Err(_) => token(FAILED),
        }
    }

    fn cmd_shr(&mut self, params: &[u8]) -> Reply {
        let Some(handle) = parse_handle(params, HANDLES) else {
            return token(MISSING);
        };
        char_reply(self.requests.poll(handle).code())
    }

    fn cmd_ghr(&mut self, params: &[u8]) -> Reply {
        let mut fields: Vec<Vec<u8, 1>, 3> = Vec::new();
        if split_fields(params, &mut fields) < 3 {
            return token(FAILED);
        }
        let Some(handle) = parse_handle(&fields[0], HANDLES) else {
            return token(FAILED);
        };
        if !self.requests.is_readable(handle) {
            return token(FAILED);
        }
        let Some(response) = self.requests.response(handle) else {
            return token(FAILED);
        };

        let mut reply = Reply::new();
        match fields[1].first() {
            Some(b'S') => {
                let _ = write!(ReplyWriter(&mut reply), "{}", response.status());
            }
            Some(b'H') => {
                let take = response.headers().len().min(REPLY_MAX);
                let _ = reply.extend_from_slice(&response.headers()[..take]);
            }
            Some(b'C') => {
                let take = response.content().len().min(REPLY_MAX);
                let _ = reply.extend_from_slice(&response.content()[..take]);
            }
            _ => return token(FAILED),
        }

        // The purge flag is honored only once the operation has settled.
        let purge = fields[2].first() == Some(&b'T');
        if purge && matches!(self.requests.poll(handle), Progress::Success | Progress::Failed) {
            self.requests.purge(handle);
        }
        reply
    }

    fn cmd_dhr(&mut self, params: &[u8]) -> Reply {
        let Some(handle) = parse_handle(params, HANDLES) else {
            return token(FAILED);
        };
        if self.requests.poll(handle) == Progress::InProgress {
            return token(FAILED);
        }
        if !self.requests.is_in_use(handle) && !self.requests.is_readable(handle) {
            return token(FAILED);
        }
        self.requests.purge(handle);
        token(OK)
    }

    fn cmd_mcg(&mut self, params: &[u8]) -> Reply {
        match self.mqtt.connect(params) {
            Ok(()) => token(OK),
            Err(_) => token(FAILED),
        }
    }

    fn cmd_msb(&mut self, params: &[u8]) -> Reply {
        let Ok(topic) = core::str::from_utf8(params) else {
            return token(FAILED);
        };
        if self.cache.subscribe(topic).is_err() {
            return token(FAILED);
        }
        if self.mqtt.subscribe(topic).is_err() {
            // Keep the cache consistent with the broker-side state.
            let _ = self.cache.unsubscribe(topic);
            return token(FAILED);
        }
        token(OK)
    }

    fn cmd_mus(&mut self, params: &[u8]) -> Reply {
        let Ok(topic) = core::str::from_utf8(params) else {
            return token(FAILED);
        };
        if !self.cache.contains(topic) {
            return token(FAILED);
        }
        if self.mqtt.unsubscribe(topic).is_err() {
            return token(FAILED);
        }
        let _ = self.cache.unsubscribe(topic);
        token(OK)
    }

    fn cmd_mua(&mut self) -> Reply {
        for topic in self.cache.topics() {
            if self.mqtt.unsubscribe(topic).is_err() {
                warn!("broker unsubscribe failed for {}", topic);
            }
        }
        self.cache.unsubscribe_all();
        token(OK)
    }

    fn cmd_mnd(&mut self, params: &[u8]) -> Reply {
        let Ok(topic) = core::str::from_utf8(params) else {
            return token(MISSING);
        };
        match self.cache.has_new_data(topic) {
            Some(true) => char_reply(b'T'),
            Some(false) => char_reply(b'F'),
            None => token(MISSING),
        }
    }

    fn cmd_mgs(&mut self, params: &[u8]) -> Reply {
        let Ok(topic) = core::str::from_utf8(params) else {
            return token(MISSING);
        };
        let Some(message) = self.cache.take_message(topic) else {
            return token(MISSING);
        };
        let mut reply = Reply::new();
        let take = message.len().min(REPLY_MAX);
        let _ = reply.extend_from_slice(&message[..take]);
        reply
    }

    fn cmd_mpb(&mut self, params: &[u8]) -> Reply {
        let mut fields: Vec<Vec<u8, TX_CONTENT_MAX>, 2> = Vec::new();
        if split_fields(params, &mut fields) < 2 {
            return token(FAILED);
        }
        let Ok(topic) = core::str::from_utf8(&fields[0]) else {
            return token(FAILED);
        };
        match self.mqtt.publish(topic, &fields[1]) {
            Ok(()) => token(OK),
            Err(_) => token(FAILED),
        }
    }
}

#[cfg(test)]
mod tests {
    use heapless::String;

    use super::*;
    use crate::provider::{ProviderError, SCAN_RESULTS_MAX, ScanEntry, WifiStatus};

    #[derive(Default)]
    struct MockWifi {
        associated: bool,
        ip: Option<[u8; 4]>,
        entries: Vec<ScanEntry, SCAN_RESULTS_MAX>,
        fail: bool,
        last_ssid: Vec<u8, SSID_MAX>,
    }

    impl WifiProvider for MockWifi {
        fn status(&self) -> WifiStatus {
            if self.associated {
                WifiStatus::GotIp
            } else {
                WifiStatus::Disconnected
            }
        }

        fn scan(
            &mut self,
            out: &mut Vec<ScanEntry, SCAN_RESULTS_MAX>,
        ) -> Result<(), ProviderError> {
            if self.fail {
                return Err(ProviderError);
            }
            for entry in &self.entries {
                let _ = out.push(entry.clone());
            }
            Ok(())
        }

        fn configure(&mut self, ssid: &[u8], _passphrase: &[u8]) -> Result<(), ProviderError> {
            if self.fail {
                return Err(ProviderError);
            }
            self.last_ssid.clear();
            let _ = self.last_ssid.extend_from_slice(ssid);
            Ok(())
        }

        fn disconnect(&mut self) -> Result<(), ProviderError> {
            self.associated = false;
            Ok(())
        }

        fn ip(&self) -> Option<[u8; 4]> {
            self.ip
        }
    }

    #[derive(Default)]
    struct MockHttp {
        fail: bool,
        began: Option<(usize, u8, Vec<u8, TX_CONTENT_MAX>)>,
    }

    impl HttpProvider for MockHttp {
        fn begin(
            &mut self,
            handle: usize,
            request: crate::http::RequestParts<'_>,
        ) -> Result<(), ProviderError> {
            if self.fail {
                return Err(ProviderError);
            }
            let mut url = Vec::new();
            let _ = url.extend_from_slice(request.url);
            self.began = Some((handle, request.method, url));
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockMqtt {
        connected: bool,
        fail: bool,
        broker_subs: usize,
        broker_unsubs: usize,
        published: Option<(String<128>, Vec<u8, 64>)>,
    }

    impl MqttProvider for MockMqtt {
        fn connect(&mut self, _uri: &[u8]) -> Result<(), ProviderError> {
            if self.fail {
                return Err(ProviderError);
            }
            self.connected = true;
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.connected
        }

        fn subscribe(&mut self, _topic: &str) -> Result<(), ProviderError> {
            if self.fail {
                return Err(ProviderError);
            }
            self.broker_subs += 1;
            Ok(())
        }

        fn unsubscribe(&mut self, _topic: &str) -> Result<(), ProviderError> {
            if self.fail {
                return Err(ProviderError);
            }
            self.broker_unsubs += 1;
            Ok(())
        }

        fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), ProviderError> {
            if self.fail {
                return Err(ProviderError);
            }
            let mut t = String::new();
            let _ = t.push_str(topic);
            let mut p = Vec::new();
            let _ = p.extend_from_slice(payload);
            self.published = Some((t, p));
            Ok(())
        }
    }

    type TestEngine = LinkEngine<MockWifi, MockHttp, MockMqtt, 3, 4>;

    fn engine() -> TestEngine {
        LinkEngine::new(
            MockWifi::default(),
            MockHttp::default(),
            MockMqtt::default(),
        )
    }

    /// `ihr` + `thr` on a fresh engine, landing on handle 0.
    fn fire(engine: &mut TestEngine) {
        assert_eq!(&engine.dispatch(b"ihr G\x1fhttp://host/path")[..], b"0");
        assert!(engine.dispatch(b"thr 0").is_empty());
    }

    #[test]
    fn nop_replies_with_an_empty_line() {
        assert!(engine().dispatch(b"nop").is_empty());
    }

    #[test]
    fn undersized_and_oversized_lines_are_refused() {
        let mut engine = engine();
        assert_eq!(&engine.dispatch(b"ab")[..], b"short");
        assert_eq!(&engine.dispatch(b"thr")[..], b"short");
        assert_eq!(&engine.dispatch(b"thr 01")[..], b"long");
    }

    #[test]
    fn unknown_or_malformed_mnemonics_are_invalid() {
        let mut engine = engine();
        assert_eq!(&engine.dispatch(b"xyz")[..], b"invalid");
        assert_eq!(&engine.dispatch(b"nopx")[..], b"invalid");
    }

    #[test]
    fn ver_reports_the_package_version() {
        assert_eq!(
            &engine().dispatch(b"ver")[..],
            env!("CARGO_PKG_VERSION").as_bytes()
        );
    }

    #[test]
    fn rst_raises_the_reset_flag() {
        let mut engine = engine();
        assert!(!engine.reset_pending());
        assert!(engine.dispatch(b"rst").is_empty());
        assert!(engine.reset_pending());
    }

    #[test]
    fn sap_reports_the_association_code() {
        let mut engine = engine();
        assert_eq!(&engine.dispatch(b"sap")[..], b"D");
        engine.wifi.associated = true;
        assert_eq!(&engine.dispatch(b"sap")[..], b"I");
    }

    #[test]
    fn gip_formats_the_address_in_dotted_quad() {
        let mut engine = engine();
        assert_eq!(&engine.dispatch(b"gip")[..], b"U");
        engine.wifi.ip = Some([10, 0, 0, 2]);
        assert_eq!(&engine.dispatch(b"gip")[..], b"10.0.0.2");
    }

    #[test]
    fn cap_stores_credentials() {
        let mut engine = engine();
        assert_eq!(&engine.dispatch(b"cap home\x1fsecret")[..], b"S");
        assert_eq!(&engine.wifi.last_ssid[..], b"home");
        // Passphrase is optional.
        assert_eq!(&engine.dispatch(b"cap open-net")[..], b"S");
    }

    #[test]
    fn cap_refuses_an_oversized_ssid() {
        let mut engine = engine();
        let mut line: Vec<u8, 64> = Vec::new();
        line.extend_from_slice(b"cap ").unwrap();
        line.extend_from_slice(&[b's'; SSID_MAX + 1]).unwrap();
        assert_eq!(&engine.dispatch(&line)[..], b"U");
    }

    #[test]
    fn lap_joins_scan_results_with_commas() {
        let mut engine = engine();
        assert!(engine.dispatch(b"lap").is_empty());

        for (ssid, auth, channel, rssi) in [("net1", 3u8, 6u8, -40i8), ("net2", 0, 11, -70)] {
            let mut name = String::new();
            name.push_str(ssid).unwrap();
            engine
                .wifi
                .entries
                .push(ScanEntry {
                    ssid: name,
                    auth,
                    channel,
                    rssi,
                })
                .unwrap();
        }
        assert_eq!(&engine.dispatch(b"lap")[..], b"net1:3:6:-40,net2:0:11:-70");
    }

    #[test]
    fn ihr_hands_out_sequential_handles_until_exhausted() {
        let mut engine = engine();
        assert_eq!(&engine.dispatch(b"ihr G\x1fhttp://a")[..], b"0");
        assert_eq!(&engine.dispatch(b"ihr G\x1fhttp://b")[..], b"1");
        assert_eq!(&engine.dispatch(b"ihr P\x1fhttp://c")[..], b"2");
        assert_eq!(&engine.dispatch(b"ihr G\x1fhttp://d")[..], b"U");
    }

    #[test]
    fn ihr_without_a_url_leaves_the_pool_untouched() {
        let mut engine = engine();
        assert_eq!(&engine.dispatch(b"ihr GET")[..], b"U");
        assert_eq!(&engine.dispatch(b"ihr G\x1fhttp://x")[..], b"0");
    }

    #[test]
    fn request_fields_are_stored_per_handle() {
        let mut engine = engine();
        assert_eq!(&engine.dispatch(b"ihr P\x1fhttp://x")[..], b"0");
        assert_eq!(&engine.dispatch(b"phr 0\x1fa=b")[..], b"S");
        assert_eq!(&engine.dispatch(b"chr 0\x1f{\"k\":1}")[..], b"S");
        assert_eq!(&engine.dispatch(b"hhr 0\x1fX-A: 1\nX-B: 2")[..], b"S");

        let parts = engine.registry().request_parts(0).unwrap();
        assert_eq!(parts.params, b"a=b");
        assert_eq!(parts.content, b"{\"k\":1}");
        assert_eq!(parts.headers, b"X-A: 1\r\nX-B: 2");

        // Handle 1 was never initialized.
        assert_eq!(&engine.dispatch(b"phr 1\x1fa=b")[..], b"U");
    }

    #[test]
    fn thr_hands_the_populated_request_to_the_provider() {
        let mut engine = engine();
        fire(&mut engine);
        let (handle, method, url) = engine.http.began.take().unwrap();
        assert_eq!(handle, 0);
        assert_eq!(method, b'G');
        assert_eq!(&url[..], b"http://host/path");
    }

    #[test]
    fn thr_refuses_an_in_flight_handle() {
        let mut engine = engine();
        fire(&mut engine);
        engine.http_event(0, HttpEvent::Connected { status: 0 });
        assert_eq!(&engine.dispatch(b"thr 0")[..], b"U");
    }

    #[test]
    fn thr_refuses_unknown_handles() {
        let mut engine = engine();
        assert_eq!(&engine.dispatch(b"thr 5")[..], b"U");
        assert_eq!(&engine.dispatch(b"thr x")[..], b"U");
        assert_eq!(&engine.dispatch(b"thr 0")[..], b"U");
    }

    #[test]
    fn shr_tracks_progress_codes() {
        let mut engine = engine();
        assert_eq!(&engine.dispatch(b"shr 0")[..], b"N");
        assert_eq!(&engine.dispatch(b"shr 9")[..], b"N");

        fire(&mut engine);
        engine.http_event(0, HttpEvent::Connected { status: 0 });
        assert_eq!(&engine.dispatch(b"shr 0")[..], b"P");
    }

    fn complete_fetch(engine: &mut TestEngine, status: i32) {
        fire(engine);
        engine.http_event(0, HttpEvent::Connected { status: 0 });
        engine.http_event(0, HttpEvent::Chunk { data: b"ab" });
        engine.http_event(0, HttpEvent::Chunk { data: b"cd" });
        engine.http_event(
            0,
            HttpEvent::HeadersComplete {
                status,
                headers: b"Content-Length: 4\r\n",
            },
        );
        engine.http_event(0, HttpEvent::Closed);
    }

    #[test]
    fn ghr_reads_response_fields() {
        let mut engine = engine();
        complete_fetch(&mut engine, 200);
        assert_eq!(&engine.dispatch(b"shr 0")[..], b"S");
        assert_eq!(&engine.dispatch(b"ghr 0\x1fS\x1fF")[..], b"200");
        assert_eq!(&engine.dispatch(b"ghr 0\x1fH\x1fF")[..], b"Content-Length: 4\r\n");
        assert_eq!(&engine.dispatch(b"ghr 0\x1fC\x1fF")[..], b"abcd");
        // Reads without the purge flag leave the handle alone.
        assert_eq!(&engine.dispatch(b"ghr 0\x1fC\x1fF")[..], b"abcd");
    }

    #[test]
    fn ghr_purge_flag_frees_the_handle() {
        let mut engine = engine();
        complete_fetch(&mut engine, 200);
        assert_eq!(&engine.dispatch(b"ghr 0\x1fC\x1fT")[..], b"abcd");
        assert_eq!(&engine.dispatch(b"shr 0")[..], b"N");
        assert_eq!(&engine.dispatch(b"ihr G\x1fhttp://y")[..], b"0");
    }

    #[test]
    fn ghr_purge_is_deferred_while_in_flight() {
        let mut engine = engine();
        fire(&mut engine);
        engine.http_event(0, HttpEvent::Connected { status: 0 });
        engine.http_event(
            0,
            HttpEvent::HeadersComplete {
                status: 200,
                headers: b"",
            },
        );
        // Status is known, so the read succeeds, but the purge flag is
        // ignored until the operation settles.
        assert_eq!(&engine.dispatch(b"ghr 0\x1fS\x1fT")[..], b"200");
        assert_eq!(&engine.dispatch(b"shr 0")[..], b"P");
    }

    #[test]
    fn ghr_refuses_an_unready_handle() {
        let mut engine = engine();
        assert_eq!(&engine.dispatch(b"ghr 0\x1fC\x1fF")[..], b"U");
        fire(&mut engine);
        assert_eq!(&engine.dispatch(b"ghr 0\x1fC\x1fF")[..], b"U");
    }

    #[test]
    fn failed_fetch_reports_its_status() {
        let mut engine = engine();
        complete_fetch(&mut engine, 404);
        assert_eq!(&engine.dispatch(b"shr 0")[..], b"U");
        assert_eq!(&engine.dispatch(b"ghr 0\x1fS\x1fF")[..], b"404");
    }

    #[test]
    fn dhr_purges_unless_in_flight() {
        let mut engine = engine();
        assert_eq!(&engine.dispatch(b"dhr 0")[..], b"U");

        fire(&mut engine);
        engine.http_event(0, HttpEvent::Connected { status: 0 });
        assert_eq!(&engine.dispatch(b"dhr 0")[..], b"U");

        engine.http_event(
            0,
            HttpEvent::HeadersComplete {
                status: 200,
                headers: b"",
            },
        );
        engine.http_event(0, HttpEvent::Closed);
        assert_eq!(&engine.dispatch(b"dhr 0")[..], b"S");
        assert!(!engine.registry().is_in_use(0));
    }

    #[test]
    fn mcg_and_mic_track_the_session() {
        let mut engine = engine();
        assert_eq!(&engine.dispatch(b"mic")[..], b"F");
        assert_eq!(&engine.dispatch(b"mcg mqtt://broker:1883")[..], b"S");
        assert_eq!(&engine.dispatch(b"mic")[..], b"T");
    }

    #[test]
    fn msb_rolls_back_on_provider_failure() {
        let mut engine = engine();
        engine.mqtt.fail = true;
        assert_eq!(&engine.dispatch(b"msb sensors/temp")[..], b"U");
        assert!(engine.subscriptions().is_empty());

        engine.mqtt.fail = false;
        assert_eq!(&engine.dispatch(b"msb sensors/temp")[..], b"S");
        assert!(engine.subscriptions().contains("sensors/temp"));
        assert_eq!(&engine.dispatch(b"msb sensors/temp")[..], b"U");
    }

    #[test]
    fn message_cache_round_trip() {
        let mut engine = engine();
        assert_eq!(&engine.dispatch(b"msb t")[..], b"S");
        assert_eq!(&engine.dispatch(b"mnd t")[..], b"F");

        engine.mqtt_arrived("t", b"21.5");
        assert_eq!(&engine.dispatch(b"mnd t")[..], b"T");
        assert_eq!(&engine.dispatch(b"mgs t")[..], b"21.5");
        assert_eq!(&engine.dispatch(b"mnd t")[..], b"F");

        assert_eq!(&engine.dispatch(b"mus t")[..], b"S");
        assert_eq!(&engine.dispatch(b"mnd t")[..], b"N");
        assert_eq!(&engine.dispatch(b"mgs t")[..], b"N");
        assert_eq!(&engine.dispatch(b"mus t")[..], b"U");
    }

    #[test]
    fn mua_forgets_every_subscription() {
        let mut engine = engine();
        assert_eq!(&engine.dispatch(b"msb a")[..], b"S");
        assert_eq!(&engine.dispatch(b"msb b")[..], b"S");
        assert_eq!(&engine.dispatch(b"mua")[..], b"S");
        assert!(engine.subscriptions().is_empty());
        assert_eq!(engine.mqtt.broker_unsubs, 2);
    }

    #[test]
    fn mpb_publishes_topic_and_payload() {
        let mut engine = engine();
        assert_eq!(&engine.dispatch(b"mpb t/led\x1fon")[..], b"S");
        let (topic, payload) = engine.mqtt.published.take().unwrap();
        assert_eq!(topic.as_str(), "t/led");
        assert_eq!(&payload[..], b"on");
    }
}
