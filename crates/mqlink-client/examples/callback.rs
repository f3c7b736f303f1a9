//! Callback example - handler object driven by the background threads.
//!
//! Run with: cargo run -p mqlink-client --example callback
//!
//! Expects a broker on localhost:1883. Set `RUST_LOG=debug` to watch the
//! connect loop and packet traffic.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use mqlink_client::{Client, ClientConfig, MqttHandler, QoS, Will};

/// Our handler - holds a client handle so it can act on events
struct MyHandler {
    client: Client,
    message_count: AtomicUsize,
}

impl MqttHandler for MyHandler {
    fn on_connected(&self, connected: bool) {
        if !connected {
            println!("Connection lost, the client will retry");
            return;
        }
        println!("Connected!");

        if let Err(e) = self.client.subscribe("example/callback/#", QoS::AtLeastOnce) {
            eprintln!("Subscribe error: {}", e);
        }

        if let Err(e) = self.client.publish(
            "example/callback/hello",
            b"Hello from callback client!",
            false,
            QoS::AtLeastOnce,
        ) {
            eprintln!("Publish error: {}", e);
        }
    }

    fn on_message(&self, topic: &str, payload: &[u8]) {
        let payload_str = String::from_utf8_lossy(payload);
        println!("Message: {} -> {}", topic, payload_str);

        let count = self.message_count.fetch_add(1, Ordering::SeqCst) + 1;
        println!("Total messages received: {}", count);
    }

    fn on_puback(&self, packet_id: u16) {
        println!("Publish acknowledged (packet_id={})", packet_id);
    }

    fn on_suback(&self, packet_id: u16, return_code: u8) {
        println!("Subscribed (packet_id={}): {:#04x}", packet_id, return_code);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ClientConfig::new("localhost", 1883)
        .client_id("callback-example")
        .clean_session(true)
        .keep_alive(30)
        .will(Will::new("example/callback/status", "offline").retain(true));

    let client = Client::new(config);
    let handler = Arc::new(MyHandler {
        client: client.clone(),
        message_count: AtomicUsize::new(0),
    });
    client.set_handler(handler.clone());

    println!("Connecting to broker...");
    client.connect(None)?;

    // Let the round trip happen, then shut down
    thread::sleep(Duration::from_secs(2));

    client.clear_handlers();
    client.disconnect()?;

    let final_count = handler.message_count.load(Ordering::SeqCst);
    println!("Final message count: {}", final_count);

    Ok(())
}
