// VirtualMachine command implementations
//
// Session-wide commands: version, capabilities, class/thread enumeration,
// suspend/resume

use crate::commands::{command_sets, vm_commands};
use crate::connection::JdwpConnection;
use crate::protocol::{CommandPacket, JdwpResult};
use crate::reader::{read_bool, read_i32, read_string, read_u64, read_u8};
use crate::types::{ReferenceTypeId, ThreadId};
use serde::{Deserialize, Serialize};

/// JVM version information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmVersion {
    pub description: String,
    pub jdwp_major: i32,
    pub jdwp_minor: i32,
    pub vm_version: String,
    pub vm_name: String,
}

/// ID sizes used by the JVM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmIdSizes {
    pub field_id_size: i32,
    pub method_id_size: i32,
    pub object_id_size: i32,
    pub reference_type_id_size: i32,
    pub frame_id_size: i32,
}

/// The capability flags that gate proxy-layer code paths.
///
/// CapabilitiesNew returns up to 32 booleans; only the ones that select a
/// code path upstream are kept by name.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct VmCapabilities {
    pub can_get_bytecodes: bool,
    pub can_get_synthetic_attribute: bool,
    pub can_redefine_classes: bool,
    pub can_get_constant_pool: bool,
}

/// One entry of the all-classes snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadedClass {
    pub ref_type_tag: u8, // 1=class, 2=interface, 3=array
    pub type_id: ReferenceTypeId,
    pub signature: String,
    pub status: i32,
}

impl JdwpConnection {
    /// Get JVM version information (VirtualMachine.Version command)
    pub async fn version(&mut self) -> JdwpResult<VmVersion> {
        let id = self.next_id();
        let packet = CommandPacket::new(id, command_sets::VIRTUAL_MACHINE, vm_commands::VERSION);

        let reply = self.send_command(packet).await?;
        reply.check_error()?;

        let mut data = reply.data();

        Ok(VmVersion {
            description: read_string(&mut data)?,
            jdwp_major: read_i32(&mut data)?,
            jdwp_minor: read_i32(&mut data)?,
            vm_version: read_string(&mut data)?,
            vm_name: read_string(&mut data)?,
        })
    }

    /// Get ID sizes (VirtualMachine.IDSizes command)
    pub async fn id_sizes(&mut self) -> JdwpResult<VmIdSizes> {
        let id = self.next_id();
        let packet = CommandPacket::new(id, command_sets::VIRTUAL_MACHINE, vm_commands::ID_SIZES);

        let reply = self.send_command(packet).await?;
        reply.check_error()?;

        let mut data = reply.data();

        Ok(VmIdSizes {
            field_id_size: read_i32(&mut data)?,
            method_id_size: read_i32(&mut data)?,
            object_id_size: read_i32(&mut data)?,
            reference_type_id_size: read_i32(&mut data)?,
            frame_id_size: read_i32(&mut data)?,
        })
    }

    /// Query capability flags (VirtualMachine.CapabilitiesNew command)
    pub async fn capabilities(&mut self) -> JdwpResult<VmCapabilities> {
        let id = self.next_id();
        let packet = CommandPacket::new(
            id,
            command_sets::VIRTUAL_MACHINE,
            vm_commands::CAPABILITIES_NEW,
        );

        let reply = self.send_command(packet).await?;
        reply.check_error()?;

        let mut data = reply.data();

        // Fixed CapabilitiesNew flag order; flags past what the VM sent
        // default to false (older agents reply with fewer booleans)
        let mut flags = [false; 32];
        for flag in flags.iter_mut() {
            if data.is_empty() {
                break;
            }
            *flag = read_bool(&mut data)?;
        }

        Ok(VmCapabilities {
            can_get_bytecodes: flags[2],
            can_get_synthetic_attribute: flags[3],
            can_redefine_classes: flags[7],
            can_get_constant_pool: flags[19],
        })
    }

    /// Snapshot of all loaded classes (VirtualMachine.AllClasses command)
    pub async fn all_classes(&mut self) -> JdwpResult<Vec<LoadedClass>> {
        let id = self.next_id();
        let packet = CommandPacket::new(id, command_sets::VIRTUAL_MACHINE, vm_commands::ALL_CLASSES);

        let reply = self.send_command(packet).await?;
        reply.check_error()?;

        let mut data = reply.data();

        let count = read_i32(&mut data)?;
        let mut classes = Vec::with_capacity(count.max(0) as usize);

        for _ in 0..count {
            classes.push(LoadedClass {
                ref_type_tag: read_u8(&mut data)?,
                type_id: read_u64(&mut data)?,
                signature: read_string(&mut data)?,
                status: read_i32(&mut data)?,
            });
        }

        Ok(classes)
    }

    /// Enumerate live threads (VirtualMachine.AllThreads command)
    pub async fn all_threads(&mut self) -> JdwpResult<Vec<ThreadId>> {
        let id = self.next_id();
        let packet = CommandPacket::new(id, command_sets::VIRTUAL_MACHINE, vm_commands::ALL_THREADS);

        let reply = self.send_command(packet).await?;
        reply.check_error()?;

        let mut data = reply.data();

        let count = read_i32(&mut data)?;
        let mut threads = Vec::with_capacity(count.max(0) as usize);

        for _ in 0..count {
            threads.push(read_u64(&mut data)?);
        }

        Ok(threads)
    }

    /// Suspend all threads (VirtualMachine.Suspend command)
    pub async fn suspend_all(&mut self) -> JdwpResult<()> {
        let id = self.next_id();
        let packet = CommandPacket::new(id, command_sets::VIRTUAL_MACHINE, vm_commands::SUSPEND);

        let reply = self.send_command(packet).await?;
        reply.check_error()
    }

    /// Resume all threads (VirtualMachine.Resume command)
    pub async fn resume_all(&mut self) -> JdwpResult<()> {
        let id = self.next_id();
        let packet = CommandPacket::new(id, command_sets::VIRTUAL_MACHINE, vm_commands::RESUME);

        let reply = self.send_command(packet).await?;
        reply.check_error()
    }
}
