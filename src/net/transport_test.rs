use super::*;

#[test]
fn host_of_strips_scheme_port_and_path() {
    assert_eq!(host_of("ws://localhost:8080/ws/websocket").as_deref(), Some("localhost"));
    assert_eq!(host_of("wss://api.itda.test/ws").as_deref(), Some("api.itda.test"));
    assert_eq!(host_of("ws://user:pw@broker.local:61614/ws?x=1").as_deref(), Some("broker.local"));
}

#[test]
fn host_of_lowercases_and_keeps_ipv6_brackets() {
    assert_eq!(host_of("WS://Broker.ITDA.test/ws").as_deref(), Some("broker.itda.test"));
    assert_eq!(host_of("ws://[::1]:8080/ws").as_deref(), Some("[::1]"));
}

#[test]
fn host_of_rejects_unparseable_urls() {
    assert_eq!(host_of("example.org/ws"), None);
    assert_eq!(host_of(""), None);
    assert_eq!(host_of("ws://a b/ws"), None);
}
