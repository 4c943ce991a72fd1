use gravity::core::sampler::{Sampler, TrafficState};
use gravity::platform::FakeHost;
use gravity::SamplerConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

const NET_DEV_HEADER: &str = "Inter-|   Receive                                                |  Transmit\n face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed\n";

fn net_dev(eth_rx: u64, eth_tx: u64, wlan_rx: u64, wlan_tx: u64) -> String {
    format!(
        "{}    lo: 9000 10 0 0 0 0 0 0 9000 10 0 0 0 0 0 0\n  eth0: {} 50 0 0 0 0 0 0 {} 20 0 0 0 0 0 0\n wlan0: {} 30 0 0 0 0 0 0 {} 30 0 0 0 0 0 0\n",
        NET_DEV_HEADER, eth_rx, eth_tx, wlan_rx, wlan_tx
    )
}

#[tokio::test]
async fn test_interface_counters_warm_then_measure() {
    let host = Arc::new(FakeHost::linux().with_file("/proc/net/dev", &net_dev(5000, 2000, 3000, 1000)));
    let mut sampler = Sampler::new(host.clone(), SamplerConfig::default(), Handle::current()).unwrap();

    let first = sampler.run_cycle();
    let network = first.network.as_ref().unwrap();
    assert_eq!(network.state, TrafficState::Warming);
    assert_eq!(first.source("network"), Some("proc_net_dev"));

    tokio::time::sleep(Duration::from_millis(150)).await;
    host.set_file("/proc/net/dev", &net_dev(505_000, 12_000, 53_000, 1000));

    let second = sampler.run_cycle();
    let network = second.network.as_ref().unwrap();
    assert_eq!(network.state, TrafficState::Active);
    assert!(network.down_bytes_per_sec > 0.0);
    let wired = network.wired.as_ref().unwrap();
    let wireless = network.wireless.as_ref().unwrap();
    assert!(wired.down_bytes_per_sec > wireless.down_bytes_per_sec);
    assert_eq!(wireless.up_bytes_per_sec, 0.0);
    assert!(network.down_rate.ends_with("/s"));

    tokio::time::sleep(Duration::from_millis(150)).await;
    let third = sampler.run_cycle();
    let network = third.network.as_ref().unwrap();
    assert_eq!(network.state, TrafficState::Idle);
    assert_eq!(network.down_bytes_per_sec, 0.0);
    assert_eq!(network.down_rate, "0 B/s");
}

#[tokio::test]
async fn test_all_zero_netstat_falls_through_to_interfaces() {
    let host = FakeHost::linux()
        .with_file(
            "/proc/net/netstat",
            "IpExt: InNoRoutes InOctets OutOctets\nIpExt: 0 0 0\n",
        )
        .with_file("/proc/net/dev", &net_dev(5000, 2000, 0, 0));
    let mut sampler = Sampler::new(Arc::new(host), SamplerConfig::default(), Handle::current()).unwrap();

    let snapshot = sampler.run_cycle();
    assert_eq!(snapshot.source("network"), Some("proc_net_dev"));
}

#[tokio::test]
async fn test_established_connections_when_no_counters() {
    let tcp = "  sl  local_address rem_address   st\n   0: 0100007F:0277 00000000:0000 0A\n   1: 0F02000A:A2C4 5DB8D822:01BB 01\n   2: 0F02000A:A2C6 5DB8D822:01BB 01\n";
    let host = FakeHost::linux().with_file("/proc/net/tcp", tcp);
    let mut sampler = Sampler::new(Arc::new(host), SamplerConfig::default(), Handle::current()).unwrap();

    let snapshot = sampler.run_cycle();
    let network = snapshot.network.as_ref().unwrap();
    assert_eq!(network.state, TrafficState::ConnectionsOnly);
    assert_eq!(network.connections, Some(2));
}

#[tokio::test]
async fn test_host_rates_preferred_on_translation_layer() {
    let counters = "ethernet|\\\\host\\network interface(ethernet)\\bytes received/sec|2048\n\
ethernet|\\\\host\\network interface(ethernet)\\bytes sent/sec|1024\n\
wi-fi adapter|\\\\host\\network interface(wi-fi adapter)\\bytes received/sec|512\n\
wi-fi adapter|\\\\host\\network interface(wi-fi adapter)\\bytes sent/sec|0\n";
    let host = FakeHost::wsl()
        .with_tool("powershell.exe")
        .with_command("powershell.exe", "Get-Counter", Some(counters))
        .with_file("/proc/net/dev", &net_dev(5000, 2000, 0, 0));
    let mut sampler = Sampler::new(Arc::new(host), SamplerConfig::default(), Handle::current()).unwrap();

    for _ in 0..300 {
        let snapshot = sampler.run_cycle();
        if snapshot.source("network") == Some("host_perf_counter") {
            let network = snapshot.network.as_ref().unwrap();
            assert_eq!(network.state, TrafficState::Active);
            assert_eq!(network.down_bytes_per_sec, 2560.0);
            assert_eq!(network.up_bytes_per_sec, 1024.0);
            assert_eq!(network.wireless.as_ref().unwrap().down_bytes_per_sec, 512.0);
            assert_eq!(snapshot.source("host_network"), Some("get_counter"));
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("host rates never reached the network probe");
}
