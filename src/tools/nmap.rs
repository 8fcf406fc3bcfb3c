//! Nmap service detection - argument vector and output parsing

use super::parse::json_document;
use crate::config::NmapOutput;
use crate::params::NmapParams;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::{json, Map, Value};

/// Build nmap arguments:
/// `[-sV] [-T4 --min-rate R] (-oJ -|-oX -) -p <ports> <target>`
pub fn args(params: &NmapParams, min_rate: u32, output: NmapOutput) -> Vec<String> {
    let mut args = Vec::new();

    if params.service_detection {
        args.push("-sV".to_string());
    }

    if params.fast {
        args.push("-T4".to_string());
        args.push("--min-rate".to_string());
        args.push(min_rate.to_string());
    }

    match output {
        NmapOutput::Json => args.push("-oJ".to_string()),
        NmapOutput::Xml => args.push("-oX".to_string()),
    }
    args.push("-".to_string()); // stdout

    args.push("-p".to_string());
    args.push(params.ports.trim().to_string());
    args.push(params.target.trim().to_string());
    args
}

/// Parse nmap stdout. Malformed output is an error even on a zero exit.
pub fn parse(stdout: &str, output: NmapOutput) -> Result<Value, String> {
    match output {
        NmapOutput::Json => json_document(stdout).map_err(|e| format!("invalid JSON: {}", e)),
        NmapOutput::Xml => parse_xml(stdout),
    }
}

fn attributes(element: &BytesStart<'_>) -> Result<Map<String, Value>, String> {
    let mut map = Map::new();
    for attr in element.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(|e| e.to_string())?;
        map.insert(key, Value::String(value.into_owned()));
    }
    Ok(map)
}

fn port_number(attrs: &Map<String, Value>) -> Value {
    attrs
        .get("portid")
        .and_then(Value::as_str)
        .and_then(|p| p.parse::<u16>().ok())
        .map(Value::from)
        .unwrap_or(Value::Null)
}

/// Convert `-oX` output into the JSON shape used for `-oJ`:
/// `{scanner, args, hosts: [{address, addresses, hostnames, status, ports: [...]}]}`
fn parse_xml(stdout: &str) -> Result<Value, String> {
    let start = stdout.find("<?xml").or_else(|| stdout.find("<nmaprun")).ok_or("no nmaprun document found")?;
    let mut reader = Reader::from_str(&stdout[start..]);
    reader.trim_text(true);

    let mut root: Option<Map<String, Value>> = None;
    let mut hosts: Vec<Value> = Vec::new();
    let mut host: Option<Map<String, Value>> = None;
    let mut port: Option<Map<String, Value>> = None;
    let mut closed = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("invalid XML at byte {}: {}", reader.buffer_position(), e))?;

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let attrs = attributes(e)?;
                match e.name().as_ref() {
                    b"nmaprun" => {
                        let mut info = Map::new();
                        info.insert("scanner".into(), attrs.get("scanner").cloned().unwrap_or(Value::Null));
                        info.insert("args".into(), attrs.get("args").cloned().unwrap_or(Value::Null));
                        info.insert("version".into(), attrs.get("version").cloned().unwrap_or(Value::Null));
                        root = Some(info);
                    }
                    b"host" => {
                        let mut entry = Map::new();
                        entry.insert("address".into(), Value::Null);
                        entry.insert("addresses".into(), json!([]));
                        entry.insert("hostnames".into(), json!([]));
                        entry.insert("status".into(), Value::Null);
                        entry.insert("ports".into(), json!([]));
                        host = Some(entry);
                    }
                    b"status" => {
                        if let Some(h) = host.as_mut() {
                            h.insert("status".into(), attrs.get("state").cloned().unwrap_or(Value::Null));
                        }
                    }
                    b"address" => {
                        if let Some(h) = host.as_mut() {
                            let addr = attrs.get("addr").cloned().unwrap_or(Value::Null);
                            let addrtype = attrs.get("addrtype").and_then(Value::as_str).unwrap_or("");
                            if addrtype != "mac" && h.get("address").map_or(true, Value::is_null) {
                                h.insert("address".into(), addr.clone());
                            }
                            if let Some(Value::Array(list)) = h.get_mut("addresses") {
                                list.push(json!({"addr": addr, "addrtype": addrtype}));
                            }
                        }
                    }
                    b"hostname" => {
                        if let (Some(h), Some(name)) = (host.as_mut(), attrs.get("name")) {
                            if let Some(Value::Array(list)) = h.get_mut("hostnames") {
                                list.push(name.clone());
                            }
                        }
                    }
                    b"port" => {
                        let mut entry = Map::new();
                        entry.insert("protocol".into(), attrs.get("protocol").cloned().unwrap_or(Value::Null));
                        entry.insert("portid".into(), port_number(&attrs));
                        entry.insert("state".into(), Value::Null);
                        entry.insert("service".into(), Value::Null);
                        if matches!(event, Event::Empty(_)) {
                            push_port(host.as_mut(), entry);
                        } else {
                            port = Some(entry);
                        }
                    }
                    b"state" => {
                        if let Some(p) = port.as_mut() {
                            p.insert("state".into(), attrs.get("state").cloned().unwrap_or(Value::Null));
                        }
                    }
                    b"service" => {
                        if let Some(p) = port.as_mut() {
                            let mut service = Map::new();
                            for key in ["name", "product", "version", "extrainfo", "tunnel"] {
                                if let Some(value) = attrs.get(key) {
                                    service.insert(key.into(), value.clone());
                                }
                            }
                            p.insert("service".into(), Value::Object(service));
                        }
                    }
                    _ => {}
                }
            }
            Event::End(ref e) => match e.name().as_ref() {
                b"port" => {
                    if let Some(p) = port.take() {
                        push_port(host.as_mut(), p);
                    }
                }
                b"host" => {
                    if let Some(h) = host.take() {
                        hosts.push(Value::Object(h));
                    }
                }
                b"nmaprun" => {
                    closed = true;
                    break;
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    let mut document = root.ok_or("missing <nmaprun> element")?;
    if !closed {
        return Err("truncated XML: </nmaprun> not reached".to_string());
    }
    document.insert("hosts".into(), Value::Array(hosts));
    Ok(Value::Object(document))
}

fn push_port(host: Option<&mut Map<String, Value>>, port: Map<String, Value>) {
    if let Some(Value::Array(ports)) = host.and_then(|h| h.get_mut("ports")) {
        ports.push(Value::Object(port));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE nmaprun>
<nmaprun scanner="nmap" args="nmap -sV -oX - -p 22,80 10.0.0.5" version="7.94">
<host starttime="1" endtime="2"><status state="up" reason="syn-ack"/>
<address addr="10.0.0.5" addrtype="ipv4"/>
<hostnames><hostname name="web01.lab" type="PTR"/></hostnames>
<ports>
<port protocol="tcp" portid="22"><state state="open" reason="syn-ack"/><service name="ssh" product="OpenSSH" version="8.9p1"/></port>
<port protocol="tcp" portid="80"><state state="closed" reason="reset"/></port>
</ports>
</host>
<runstats><finished time="2"/></runstats>
</nmaprun>
"#;

    #[test]
    fn fast_mode_applies_min_rate() {
        let args = args(&NmapParams::new("10.0.0.5"), 5000, NmapOutput::Json);
        assert_eq!(args, vec!["-sV", "-T4", "--min-rate", "5000", "-oJ", "-", "-p", "1-1024", "10.0.0.5"]);
    }

    #[test]
    fn plain_mode_has_no_timing_flags() {
        let mut params = NmapParams::new("10.0.0.5");
        params.fast = false;
        params.service_detection = false;
        params.ports = "22,80".into();
        let args = args(&params, 1000, NmapOutput::Xml);
        assert_eq!(args, vec!["-oX", "-", "-p", "22,80", "10.0.0.5"]);
    }

    #[test]
    fn json_output_is_parsed() {
        let doc = parse(r#"{"hosts":[{"address":"10.0.0.5"}]}"#, NmapOutput::Json).unwrap();
        assert_eq!(doc["hosts"][0]["address"], "10.0.0.5");
        assert!(parse("Starting Nmap 7.94\n{\"hosts\": [", NmapOutput::Json).is_err());
    }

    #[test]
    fn xml_output_becomes_json_structure() {
        let doc = parse(XML, NmapOutput::Xml).unwrap();
        let host = &doc["hosts"][0];
        assert_eq!(host["address"], "10.0.0.5");
        assert_eq!(host["status"], "up");
        assert_eq!(host["hostnames"][0], "web01.lab");
        assert_eq!(host["ports"][0]["portid"], 22);
        assert_eq!(host["ports"][0]["state"], "open");
        assert_eq!(host["ports"][0]["service"]["product"], "OpenSSH");
        assert_eq!(host["ports"][1]["service"], Value::Null);
    }

    #[test]
    fn truncated_xml_is_rejected() {
        let cut = &XML[..XML.find("</ports>").unwrap()];
        assert!(parse(cut, NmapOutput::Xml).is_err());
        assert!(parse("nothing here", NmapOutput::Xml).is_err());
    }
}
