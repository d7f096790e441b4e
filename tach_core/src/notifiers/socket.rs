use super::{FormatTable, Notifier};
use crate::error::{Result, TachError};
use crate::value::{Measurement, Params};
use parking_lot::Mutex;
use std::fmt;
use std::io::{self, Write};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, TcpStream, ToSocketAddrs, UdpSocket};
use std::sync::Arc;
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Tcp,
    Udp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Read the `host` and `port` options of a socket driver.
    pub fn from_params(driver: &str, params: &Params) -> Result<Self> {
        let missing = |key: &str| TachError::Driver {
            name: driver.to_string(),
            reason: format!("missing '{}' option", key),
        };

        let host = params.get("host").ok_or_else(|| missing("host"))?;
        let raw_port = params.get("port").ok_or_else(|| missing("port"))?;
        let port = raw_port.trim().parse::<u16>().map_err(|e| TachError::Driver {
            name: driver.to_string(),
            reason: format!("invalid port '{}': {}", raw_port, e),
        })?;

        Ok(Self::new(host.trim(), port))
    }

    fn socket_addr(&self) -> io::Result<SocketAddr> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("no address for {}", self))
            })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// An open, connected socket.
pub trait Connection: Send {
    fn send_all(&mut self, body: &[u8]) -> io::Result<()>;
}

impl Connection for TcpStream {
    fn send_all(&mut self, body: &[u8]) -> io::Result<()> {
        self.write_all(body)
    }
}

struct UdpConnection(UdpSocket);

impl Connection for UdpConnection {
    fn send_all(&mut self, body: &[u8]) -> io::Result<()> {
        self.0.send(body).map(|_| ())
    }
}

/// Opens connections for socket notifiers.
pub trait Connector: Send + Sync {
    fn connect(&self, endpoint: &Endpoint, transport: Transport) -> io::Result<Box<dyn Connection>>;
}

/// Blocking `std::net` sockets with no timeouts.
#[derive(Debug, Default, Clone, Copy)]
pub struct NetConnector;

impl Connector for NetConnector {
    fn connect(
        &self,
        endpoint: &Endpoint,
        transport: Transport,
    ) -> io::Result<Box<dyn Connection>> {
        let addr = endpoint.socket_addr()?;

        match transport {
            Transport::Tcp => Ok(Box::new(TcpStream::connect(addr)?)),
            Transport::Udp => {
                let local = if addr.is_ipv4() {
                    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
                } else {
                    SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
                };
                let socket = UdpSocket::bind(local)?;
                socket.connect(addr)?;
                Ok(Box::new(UdpConnection(socket)))
            }
        }
    }
}

/// Base for notifiers talking to a host/port service over one cached
/// connection.
pub struct SocketNotifier {
    driver: String,
    endpoint: Endpoint,
    transport: Transport,
    formats: FormatTable,
    connector: Arc<dyn Connector>,
    connection: Mutex<Option<Box<dyn Connection>>>,
}

impl SocketNotifier {
    pub fn new(
        driver: impl Into<String>,
        endpoint: Endpoint,
        transport: Transport,
        formats: FormatTable,
    ) -> Self {
        Self {
            driver: driver.into(),
            endpoint,
            transport,
            formats,
            connector: Arc::new(NetConnector),
            connection: Mutex::new(None),
        }
    }

    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn driver(&self) -> &str {
        &self.driver
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    pub fn is_connected(&self) -> bool {
        self.connection.lock().is_some()
    }

    fn transmit(&self, body: &str) {
        let mut connection = self.connection.lock();

        // The connection is kept open for a long time, so a failed send gets
        // exactly one more try on a freshly opened connection.
        for round in 0..2 {
            if connection.is_none() {
                match self.connector.connect(&self.endpoint, self.transport) {
                    Ok(opened) => {
                        debug!(
                            driver = %self.driver,
                            endpoint = %self.endpoint,
                            "Connected to server"
                        );
                        *connection = Some(opened);
                    }
                    Err(e) => {
                        error!(
                            driver = %self.driver,
                            endpoint = %self.endpoint,
                            error = %e,
                            "Error connecting to server"
                        );
                        return;
                    }
                }
            }

            let Some(open) = connection.as_mut() else {
                return;
            };

            match open.send_all(body.as_bytes()) {
                Ok(()) => return,
                Err(source) => {
                    let err = TachError::Delivery {
                        endpoint: self.endpoint.to_string(),
                        source,
                    };
                    if round == 0 {
                        warn!(
                            driver = %self.driver,
                            error = %err,
                            "Send failed, reopening connection"
                        );
                    } else {
                        error!(driver = %self.driver, error = %err, "Dropping message");
                    }
                    *connection = None;
                }
            }
        }
    }
}

impl Notifier for SocketNotifier {
    fn format(&self, measurement: &Measurement, label: &str) -> Option<String> {
        self.formats.format(measurement, label)
    }

    fn send(&self, body: &str) {
        self.transmit(body);
    }

    fn reset(&self) {
        *self.connection.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct FakeConnector {
        refuse: bool,
        failing_sends: AtomicUsize,
        connects: AtomicUsize,
        buffer: Arc<Mutex<Vec<String>>>,
        opened: Mutex<Vec<Arc<AtomicBool>>>,
    }

    impl FakeConnector {
        fn failing(sends: usize) -> Arc<Self> {
            Arc::new(Self {
                failing_sends: AtomicUsize::new(sends),
                ..Default::default()
            })
        }

        fn is_open(&self, index: usize) -> bool {
            self.opened.lock()[index].load(Ordering::SeqCst)
        }
    }

    struct FakeConnection {
        connector: Arc<FakeConnector>,
        open: Arc<AtomicBool>,
    }

    impl Drop for FakeConnection {
        fn drop(&mut self) {
            self.open.store(false, Ordering::SeqCst);
        }
    }

    impl Connection for FakeConnection {
        fn send_all(&mut self, body: &[u8]) -> io::Result<()> {
            let failing = &self.connector.failing_sends;
            if failing.load(Ordering::SeqCst) > 0 {
                failing.fetch_sub(1, Ordering::SeqCst);
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe"));
            }
            self.connector
                .buffer
                .lock()
                .push(String::from_utf8_lossy(body).into_owned());
            Ok(())
        }
    }

    struct SharedConnector(Arc<FakeConnector>);

    impl Connector for SharedConnector {
        fn connect(
            &self,
            _endpoint: &Endpoint,
            _transport: Transport,
        ) -> io::Result<Box<dyn Connection>> {
            if self.0.refuse {
                return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
            }
            self.0.connects.fetch_add(1, Ordering::SeqCst);
            let open = Arc::new(AtomicBool::new(true));
            self.0.opened.lock().push(open.clone());
            Ok(Box::new(FakeConnection {
                connector: self.0.clone(),
                open,
            }))
        }
    }

    fn notifier(fake: &Arc<FakeConnector>) -> SocketNotifier {
        SocketNotifier::new(
            "test",
            Endpoint::new("test.example.com", 12345),
            Transport::Tcp,
            FormatTable::new(),
        )
        .with_connector(Arc::new(SharedConnector(fake.clone())))
    }

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_endpoint_from_params() {
        let endpoint = Endpoint::from_params(
            "graphite",
            &params(&[("host", "test.example.com"), ("port", "12345")]),
        )
        .unwrap();
        assert_eq!(endpoint, Endpoint::new("test.example.com", 12345));
        assert_eq!(endpoint.to_string(), "test.example.com:12345");

        let err = Endpoint::from_params("graphite", &params(&[("host", "h")])).unwrap_err();
        assert!(err.to_string().contains("missing 'port'"));

        let err = Endpoint::from_params("statsd", &params(&[("host", "h"), ("port", "http")]))
            .unwrap_err();
        assert!(err.to_string().contains("invalid port"));
    }

    #[test]
    fn test_connection_is_cached() {
        let fake = FakeConnector::failing(0);
        let notifier = notifier(&fake);

        notifier.send("one");
        notifier.send("two");

        assert_eq!(fake.connects.load(Ordering::SeqCst), 1);
        assert_eq!(*fake.buffer.lock(), vec!["one", "two"]);
        assert!(notifier.is_connected());
    }

    #[test]
    fn test_send_retries_once_on_new_connection() {
        let fake = FakeConnector::failing(1);
        let notifier = notifier(&fake);

        notifier.send("test");

        assert_eq!(*fake.buffer.lock(), vec!["test"]);
        assert_eq!(fake.connects.load(Ordering::SeqCst), 2);
        assert!(!fake.is_open(0));
        assert!(fake.is_open(1));
        assert!(notifier.is_connected());
    }

    #[test]
    fn test_send_gives_up_after_second_failure() {
        let fake = FakeConnector::failing(2);
        let notifier = notifier(&fake);

        notifier.send("test");

        assert!(fake.buffer.lock().is_empty());
        assert_eq!(fake.connects.load(Ordering::SeqCst), 2);
        assert!(!notifier.is_connected());

        // The next message goes out on a fresh connection
        notifier.send("again");
        assert_eq!(*fake.buffer.lock(), vec!["again"]);
    }

    #[test]
    fn test_connect_failure_drops_message() {
        let fake = Arc::new(FakeConnector {
            refuse: true,
            ..Default::default()
        });
        let notifier = notifier(&fake);

        notifier.send("test");

        assert!(fake.buffer.lock().is_empty());
        assert!(!notifier.is_connected());
    }

    #[test]
    fn test_reset_closes_connection() {
        let fake = FakeConnector::failing(0);
        let notifier = notifier(&fake);

        notifier.send("test");
        assert!(fake.is_open(0));

        notifier.reset();
        assert!(!fake.is_open(0));
        assert!(!notifier.is_connected());

        notifier.send("test");
        assert_eq!(fake.connects.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_tcp_delivery() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let notifier = SocketNotifier::new(
            "tcp",
            Endpoint::new("127.0.0.1", port),
            Transport::Tcp,
            FormatTable::new(),
        );

        notifier.send("label value 1\n");

        let (stream, _) = listener.accept().unwrap();
        let mut line = String::new();
        BufReader::new(stream).read_line(&mut line).unwrap();
        assert_eq!(line, "label value 1\n");
    }

    #[test]
    fn test_udp_delivery() {
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        server.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let port = server.local_addr().unwrap().port();
        let notifier = SocketNotifier::new(
            "udp",
            Endpoint::new("127.0.0.1", port),
            Transport::Udp,
            FormatTable::new(),
        );

        notifier.send("label:2|c");

        let mut buf = [0u8; 512];
        let (n, _) = server.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"label:2|c");
    }
}
