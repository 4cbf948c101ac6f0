// JDWP connection management
//
// Handles TCP attach, handshake, reply routing, and teardown

use crate::commands::{command_sets, vm_commands};
use crate::protocol::*;
use crate::replyloop::{spawn_reply_router, RouterHandle};
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct JdwpConnection {
    router: RouterHandle,
    next_id: AtomicU32,
    disposed: bool,
}

impl JdwpConnection {
    /// Attach to a VM's JDWP agent
    pub async fn attach(host: &str, port: u16) -> JdwpResult<Self> {
        info!("Attaching to JDWP at {}:{}", host, port);

        let mut stream = TcpStream::connect((host, port)).await?;
        Self::handshake(&mut stream).await?;

        let (reader, writer) = stream.into_split();
        let router = spawn_reply_router(reader, writer);

        Ok(Self {
            router,
            next_id: AtomicU32::new(1),
            disposed: false,
        })
    }

    async fn handshake(stream: &mut TcpStream) -> JdwpResult<()> {
        debug!("Performing JDWP handshake");

        stream.write_all(JDWP_HANDSHAKE).await?;
        stream.flush().await?;

        let mut buf = vec![0u8; JDWP_HANDSHAKE.len()];
        stream.read_exact(&mut buf).await?;

        if buf != JDWP_HANDSHAKE {
            warn!("Invalid handshake response: {:?}", buf);
            return Err(JdwpError::InvalidHandshake);
        }

        info!("JDWP handshake successful");
        Ok(())
    }

    /// Send a command and wait for its reply
    pub async fn send_command(&mut self, packet: CommandPacket) -> JdwpResult<ReplyPacket> {
        if self.disposed {
            return Err(JdwpError::Disposed);
        }
        debug!("Sending command packet id={}", packet.id);
        self.router.send_command(packet).await
    }

    /// Generate next packet ID
    pub fn next_id(&self) -> u32 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Tear down the session (VirtualMachine.Dispose).
    ///
    /// Tolerates the VM already being gone; a second call is a no-op.
    pub async fn dispose(&mut self) -> JdwpResult<()> {
        if self.disposed {
            return Ok(());
        }
        self.disposed = true;

        let id = self.next_id();
        let packet = CommandPacket::new(id, command_sets::VIRTUAL_MACHINE, vm_commands::DISPOSE);

        match self.router.send_command(packet).await {
            Ok(reply) => reply.check_error().or_else(|e| {
                if e.is_fatal() {
                    debug!("Dispose raced with VM death: {}", e);
                    Ok(())
                } else {
                    Err(e)
                }
            }),
            Err(e) if e.is_fatal() => {
                debug!("Dispose on dead connection: {}", e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}
