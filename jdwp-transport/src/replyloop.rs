// JDWP reply router
//
// Owns the socket halves and matches reply packets to the commands that
// are waiting on them. Unsolicited command packets from the VM (event
// sets) are logged and dropped: event dispatch is not this crate's job,
// and a suspended-VM inspection session never depends on them.

use crate::protocol::{CommandPacket, JdwpError, JdwpResult, ReplyPacket, HEADER_SIZE, REPLY_FLAG};
use std::collections::HashMap;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Maximum allowed JDWP packet size (10MB)
/// Prevents memory exhaustion from a malicious or buggy VM
const MAX_PACKET_SIZE: usize = 10 * 1024 * 1024;

/// An in-flight command paired with the channel awaiting its reply
struct PendingCommand {
    packet: CommandPacket,
    reply_tx: oneshot::Sender<JdwpResult<ReplyPacket>>,
}

/// Handle for submitting commands to the router task
#[derive(Clone, Debug)]
pub struct RouterHandle {
    command_tx: mpsc::Sender<PendingCommand>,
}

impl RouterHandle {
    /// Send a command and wait for its reply
    pub async fn send_command(&self, packet: CommandPacket) -> JdwpResult<ReplyPacket> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(PendingCommand { packet, reply_tx })
            .await
            .map_err(|_| JdwpError::ConnectionClosed)?;

        reply_rx.await.map_err(|_| JdwpError::ConnectionClosed)?
    }
}

/// Spawn the router task over the split socket
pub fn spawn_reply_router(reader: OwnedReadHalf, writer: OwnedWriteHalf) -> RouterHandle {
    let (command_tx, command_rx) = mpsc::channel(32);

    tokio::spawn(router_task(reader, writer, command_rx));

    RouterHandle { command_tx }
}

async fn router_task(
    mut reader: OwnedReadHalf,
    mut writer: OwnedWriteHalf,
    mut command_rx: mpsc::Receiver<PendingCommand>,
) {
    info!("JDWP reply router started");

    let mut pending: HashMap<u32, oneshot::Sender<JdwpResult<ReplyPacket>>> = HashMap::new();

    loop {
        tokio::select! {
            cmd = command_rx.recv() => {
                let Some(cmd) = cmd else {
                    // Connection handle dropped; nothing more will be asked of us
                    break;
                };

                let packet_id = cmd.packet.id;
                debug!("Sending command id={}", packet_id);

                let encoded = cmd.packet.encode();
                if let Err(e) = writer.write_all(&encoded).await {
                    error!("Failed to write command: {}", e);
                    cmd.reply_tx.send(Err(JdwpError::Io(e))).ok();
                    continue;
                }
                if let Err(e) = writer.flush().await {
                    error!("Failed to flush command: {}", e);
                    cmd.reply_tx.send(Err(JdwpError::Io(e))).ok();
                    continue;
                }

                pending.insert(packet_id, cmd.reply_tx);
            }

            result = read_packet(&mut reader) => {
                match result {
                    Ok((true, packet_id, data)) => {
                        debug!("Received reply id={}", packet_id);
                        if let Some(tx) = pending.remove(&packet_id) {
                            tx.send(ReplyPacket::decode(&data)).ok();
                        } else {
                            warn!("Reply for unknown command id={}", packet_id);
                        }
                    }
                    Ok((false, _, data)) => {
                        // Event set from the VM; not our concern
                        debug!("Dropping unsolicited command packet, len={}", data.len());
                    }
                    Err(e) => {
                        error!("Failed to read packet: {}", e);
                        break;
                    }
                }
            }
        }
    }

    // Fail anything still waiting so callers see a closed connection
    // instead of hanging on the oneshot
    for (_, tx) in pending.drain() {
        tx.send(Err(JdwpError::ConnectionClosed)).ok();
    }

    info!("JDWP reply router shutting down");
}

/// Read one packet; returns (is_reply, packet id, full packet bytes)
async fn read_packet(reader: &mut OwnedReadHalf) -> JdwpResult<(bool, u32, Vec<u8>)> {
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header).await.map_err(JdwpError::Io)?;

    let length = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
    let packet_id = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
    let flags = header[8];

    if length < HEADER_SIZE {
        return Err(JdwpError::Protocol(format!("Invalid packet length: {length}")));
    }
    if length > MAX_PACKET_SIZE {
        return Err(JdwpError::Protocol(format!(
            "Packet too large: {length} bytes (max: {MAX_PACKET_SIZE} bytes)"
        )));
    }

    let mut full_packet = header.to_vec();
    let data_len = length - HEADER_SIZE;
    if data_len > 0 {
        let mut data = vec![0u8; data_len];
        reader.read_exact(&mut data).await.map_err(JdwpError::Io)?;
        full_packet.extend_from_slice(&data);
    }

    Ok((flags == REPLY_FLAG, packet_id, full_packet))
}
