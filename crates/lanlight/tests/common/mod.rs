#![allow(dead_code)]

use std::collections::BTreeMap;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use lanlight::protocol::{Flags, GroupId, Hsbk, MacAddress, Payload, Response, encode_frame};
use lanlight::{Client, ClientConfig};

/// State of one simulated bulb, kept as wire values.
#[derive(Debug, Clone)]
pub struct Bulb {
    pub product: u32,
    pub firmware: (u16, u16),
    pub power: u16,
    pub light: u16,
    pub color: Hsbk,
    pub label: String,
    pub group: (GroupId, String),
    pub location: (GroupId, String),
    pub infrared: u16,
    /// Drops every request without answering.
    pub silent: bool,
    /// Holds each answer back this long.
    pub delay: Option<Duration>,
    /// Stamps answers with this MAC instead of its own.
    pub reply_as: Option<MacAddress>,
    /// Message type and payload of every request addressed to this bulb.
    pub received: Vec<(u16, Vec<u8>)>,
}

impl Bulb {
    pub fn new(product: u32) -> Self {
        Self {
            product,
            firmware: (2, 80),
            power: 0,
            light: 0,
            color: Hsbk::new(0.0, 0.0, 1.0, 3500),
            label: String::from("Bulb"),
            group: (GroupId([0; 16]), String::new()),
            location: (GroupId([0; 16]), String::new()),
            infrared: 0,
            silent: false,
            delay: None,
            reply_as: None,
            received: Vec::new(),
        }
    }

    pub fn in_group(mut self, id: GroupId, label: &str) -> Self {
        self.group = (id, label.to_string());
        self
    }

    pub fn count(&self, message_type: u16) -> usize {
        self.received
            .iter()
            .filter(|(kind, _)| *kind == message_type)
            .count()
    }

    pub fn last(&self, message_type: u16) -> Option<&[u8]> {
        self.received
            .iter()
            .rev()
            .find(|(kind, _)| *kind == message_type)
            .map(|(_, payload)| payload.as_slice())
    }

    fn group_payload(group: &(GroupId, String)) -> Vec<u8> {
        let mut payload = Payload::new(56);
        payload.put_id(&group.0).unwrap();
        payload.put_str(&group.1, 32).unwrap();
        payload.put_timestamp(0).unwrap();
        payload.into_bytes()
    }

    fn state_payload(&self) -> Vec<u8> {
        let mut payload = Payload::new(52);
        payload.put_color(&self.color).unwrap();
        payload.skip(2).unwrap();
        payload.put_u16(self.power).unwrap();
        payload.put_str(&self.label, 32).unwrap();
        payload.skip(8).unwrap();
        payload.into_bytes()
    }

    /// Applies a request and returns the state message to send back.
    fn handle(&mut self, request: &Response, port: u16) -> Option<(u16, Vec<u8>)> {
        let mut input = request.payload();
        let reply = match request.message_type {
            2 => {
                let mut payload = Payload::new(5);
                payload.put_u8(1).unwrap().put_u32(port as u32).unwrap();
                (3, payload.into_bytes())
            }
            14 | 18 => {
                let mut payload = Payload::new(20);
                payload
                    .put_timestamp(0)
                    .unwrap()
                    .skip(8)
                    .unwrap()
                    .put_u16(self.firmware.1)
                    .unwrap()
                    .put_u16(self.firmware.0)
                    .unwrap();
                (request.message_type + 1, payload.into_bytes())
            }
            20 => (22, self.power.to_le_bytes().to_vec()),
            21 => {
                self.power = input.get_u16().unwrap();
                (22, self.power.to_le_bytes().to_vec())
            }
            23 | 24 => {
                if request.message_type == 24 {
                    self.label = input.get_str(32).unwrap();
                }
                let mut payload = Payload::new(32);
                payload.put_str(&self.label, 32).unwrap();
                (25, payload.into_bytes())
            }
            32 => {
                let mut payload = Payload::new(12);
                payload
                    .put_u32(1)
                    .unwrap()
                    .put_u32(self.product)
                    .unwrap()
                    .put_u32(0)
                    .unwrap();
                (33, payload.into_bytes())
            }
            34 => (35, vec![0; 24]),
            38 => return None,
            48 => (50, Self::group_payload(&self.location)),
            49 => {
                self.location = (input.get_id().unwrap(), input.get_str(32).unwrap());
                (50, Self::group_payload(&self.location))
            }
            51 => (53, Self::group_payload(&self.group)),
            52 => {
                self.group = (input.get_id().unwrap(), input.get_str(32).unwrap());
                (53, Self::group_payload(&self.group))
            }
            58 => (59, request.payload.clone()),
            101 => (107, self.state_payload()),
            102 => {
                input.skip(1).unwrap();
                self.color = input.get_color().unwrap();
                (107, self.state_payload())
            }
            116 => (118, self.light.to_le_bytes().to_vec()),
            117 => {
                self.light = input.get_u16().unwrap();
                (118, self.light.to_le_bytes().to_vec())
            }
            120 => (121, self.infrared.to_le_bytes().to_vec()),
            122 => {
                self.infrared = input.get_u16().unwrap();
                (121, self.infrared.to_le_bytes().to_vec())
            }
            _ => return None,
        };
        Some(reply)
    }
}

pub fn mac(last: u8) -> MacAddress {
    MacAddress([0xd0, 0x73, 0xd5, 0x00, 0x00, last])
}

/// Any number of bulbs answering on one loopback socket. Tagged requests
/// reach every bulb; addressed ones only the bulb with that MAC.
pub struct FakeLan {
    pub addr: SocketAddr,
    bulbs: Arc<Mutex<BTreeMap<MacAddress, Bulb>>>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl FakeLan {
    pub fn start(bulbs: Vec<(MacAddress, Bulb)>) -> Self {
        Self::start_at("127.0.0.1:0", bulbs)
    }

    pub fn start_at(addr: &str, bulbs: Vec<(MacAddress, Bulb)>) -> Self {
        let socket = UdpSocket::bind(addr).unwrap();
        socket
            .set_read_timeout(Some(Duration::from_millis(5)))
            .unwrap();
        let addr = socket.local_addr().unwrap();

        let bulbs = Arc::new(Mutex::new(bulbs.into_iter().collect()));
        let stop = Arc::new(AtomicBool::new(false));

        let shared = Arc::clone(&bulbs);
        let stopped = Arc::clone(&stop);
        let thread = thread::spawn(move || serve(socket, shared, stopped));

        Self {
            addr,
            bulbs,
            stop,
            thread: Some(thread),
        }
    }

    pub fn with<R>(&self, mac: MacAddress, f: impl FnOnce(&mut Bulb) -> R) -> R {
        let mut guard = self.bulbs.lock().unwrap();
        f(guard.get_mut(&mac).unwrap())
    }

    /// Unplugs a bulb, e.g. to move it to another network.
    pub fn take(&self, mac: MacAddress) -> Bulb {
        self.bulbs.lock().unwrap().remove(&mac).unwrap()
    }

    pub fn put(&self, mac: MacAddress, bulb: Bulb) {
        self.bulbs.lock().unwrap().insert(mac, bulb);
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig {
            bind: "127.0.0.1:0".parse().unwrap(),
            device_port: self.addr.port(),
            broadcast: vec![self.addr.ip()],
            request_timeout: Duration::from_millis(200),
            discovery_timeout: Duration::from_millis(100),
            ping_timeout: Duration::from_millis(200),
            watch_interval: Duration::from_millis(50),
            rate_limit: Duration::from_millis(10),
            poll_interval: Duration::from_millis(1),
            source: None,
        }
    }

    /// A client that has already discovered every bulb.
    pub fn client(&self) -> Client {
        let mut client = Client::new(self.config()).unwrap();
        client.scan(Duration::from_millis(100)).unwrap();
        client
    }
}

impl Drop for FakeLan {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn serve(socket: UdpSocket, bulbs: Arc<Mutex<BTreeMap<MacAddress, Bulb>>>, stop: Arc<AtomicBool>) {
    let port = socket.local_addr().unwrap().port();
    let mut buffer = [0u8; 1500];

    while !stop.load(Ordering::SeqCst) {
        let (len, from) = match socket.recv_from(&mut buffer) {
            Ok(received) => received,
            Err(_) => continue,
        };
        let Ok(request) = Response::parse(&buffer[..len], from) else {
            continue;
        };

        let mut replies = Vec::new();
        {
            let mut bulbs = bulbs.lock().unwrap();
            for (mac, bulb) in bulbs.iter_mut() {
                if !request.tagged && *mac != request.mac {
                    continue;
                }
                bulb.received
                    .push((request.message_type, request.payload.clone()));
                if bulb.silent {
                    continue;
                }
                if let Some((kind, payload)) = bulb.handle(&request, port) {
                    replies.push((bulb.delay, bulb.reply_as.unwrap_or(*mac), kind, payload));
                }
            }
        }

        for (delay, mac, kind, payload) in replies {
            if let Some(delay) = delay {
                thread::sleep(delay);
            }
            let frame = encode_frame(
                request.source,
                request.sequence,
                mac,
                Flags::empty(),
                kind,
                &payload,
            );
            let _ = socket.send_to(&frame, from);
        }
    }
}
