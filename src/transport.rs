//! StatsD transport.
//!
//! Every observation is sent as a gauge, one UDP datagram per metric:
//! `<namespace>.<path>:<value>|g`.

use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use tracing::{debug, info};

use crate::error::CollectError;
use crate::model::Observation;

/// Destination for gauges.
pub trait MetricSink {
    /// Sends one gauge. `name` excludes the namespace.
    fn gauge(&mut self, name: &str, value: &str) -> io::Result<()>;
}

/// StatsD client over UDP.
pub struct StatsdSink {
    socket: UdpSocket,
    target: SocketAddr,
    namespace: String,
}

impl StatsdSink {
    /// Resolves `host:port` and binds a local socket of the matching family.
    pub fn connect(host: &str, port: u16, namespace: &str) -> Result<Self, CollectError> {
        let target = (host, port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                CollectError::InvalidArgument(format!("cannot resolve statsd host '{}'", host))
            })?;
        let bind: SocketAddr = if target.is_ipv4() {
            ([0u8; 4], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(bind)?;
        debug!(%target, namespace, "statsd sink ready");
        Ok(Self {
            socket,
            target,
            namespace: namespace.to_string(),
        })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Datagram payload for a gauge.
    pub fn format_gauge(&self, name: &str, value: &str) -> String {
        let stat = if self.namespace.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.namespace, name)
        };
        format!("{}:{}|g", escape_stat_name(&stat), value)
    }
}

impl MetricSink for StatsdSink {
    fn gauge(&mut self, name: &str, value: &str) -> io::Result<()> {
        let payload = self.format_gauge(name, value);
        self.socket.send_to(payload.as_bytes(), self.target)?;
        Ok(())
    }
}

/// Replaces the StatsD protocol separators `:`, `|` and `@` in a stat name.
fn escape_stat_name(name: &str) -> String {
    name.replace("::", ".")
        .chars()
        .map(|c| if matches!(c, ':' | '|' | '@') { '_' } else { c })
        .collect()
}

/// Sends every observation with a numeric value; returns the number sent.
///
/// Values that are not numbers (e.g. `on` from a `SHOW` query) are skipped.
pub fn send_all<M: MetricSink + ?Sized>(
    sink: &mut M,
    observations: &[Observation],
) -> Result<usize, CollectError> {
    let mut sent = 0;
    for observation in observations {
        let Some(value) = observation.value.as_ref() else {
            continue;
        };
        let name = observation.dotted_path();
        match value.as_numeric() {
            Some(number) => {
                sink.gauge(&name, &number)?;
                sent += 1;
            }
            None => debug!(metric = %name, value = %value, "non-numeric value, not sent"),
        }
    }
    info!(sent, total = observations.len(), "metrics sent");
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MetricValue;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingSink {
        gauges: Vec<(String, String)>,
    }

    impl MetricSink for RecordingSink {
        fn gauge(&mut self, name: &str, value: &str) -> io::Result<()> {
            self.gauges.push((name.to_string(), value.to_string()));
            Ok(())
        }
    }

    fn obs(path: &[&str], value: Option<MetricValue>) -> Observation {
        Observation::new(path.iter().map(|s| s.to_string()).collect(), value, 0)
    }

    #[test]
    fn sends_numeric_values_only() {
        let mut sink = RecordingSink::default();
        let observations = vec![
            obs(&["config", "instance", "max_connections"], Some(MetricValue::Raw("100".into()))),
            obs(&["xlog", "location"], Some(MetricValue::Counter(96181255240))),
            obs(&["config", "fsync"], Some(MetricValue::Raw("on".into()))),
            obs(&["backends", "h", "max_wait"], Some(MetricValue::Integer(3))),
            obs(&["null"], None),
        ];
        let sent = send_all(&mut sink, &observations).unwrap();
        assert_eq!(sent, 3);
        assert_eq!(
            sink.gauges,
            vec![
                ("config.instance.max_connections".to_string(), "100".to_string()),
                ("xlog.location".to_string(), "96181255240".to_string()),
                ("backends.h.max_wait".to_string(), "3".to_string()),
            ]
        );
    }

    #[test]
    fn escapes_protocol_characters() {
        assert_eq!(escape_stat_name("a::b:c|d@e"), "a.b_c_d_e");
    }

    #[test]
    fn delivers_datagrams_over_udp() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let port = receiver.local_addr().unwrap().port();

        let mut sink = StatsdSink::connect("127.0.0.1", port, "db1.postgresql").unwrap();
        sink.gauge("sessions.app.alice.idle", "3").unwrap();

        let mut buf = [0u8; 512];
        let n = receiver.recv(&mut buf).unwrap();
        assert_eq!(
            std::str::from_utf8(&buf[..n]).unwrap(),
            "db1.postgresql.sessions.app.alice.idle:3|g"
        );
    }

    #[test]
    fn empty_namespace_is_omitted() {
        let sink = StatsdSink::connect("127.0.0.1", 8125, "").unwrap();
        assert_eq!(sink.format_gauge("a.b", "1"), "a.b:1|g");
    }
}
