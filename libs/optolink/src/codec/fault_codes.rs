//! Fault code labels for Vitodens-class controllers (KW1 boiler fault byte).

/// Look up the label the controller documentation gives for a fault code.
pub fn fault_label(code: u8) -> Option<&'static str> {
    let label = match code {
        0x00 => "No fault",
        0x0F => "Service due",
        0x10 => "Outside temperature sensor short circuit",
        0x18 => "Outside temperature sensor open circuit",
        0x19 => "External outside temperature sensor fault (ATS1)",
        0x1D..=0x1F => "Flow rate sensor fault (STRS1)",
        0x20 => "System flow sensor short circuit",
        0x28 => "System flow sensor open circuit",
        0x30 => "Boiler temperature sensor short circuit",
        0x38 => "Boiler temperature sensor open circuit",
        0x40 => "Flow sensor HC2 short circuit",
        0x41 => "Return sensor HC2 short circuit",
        0x44 => "Flow sensor HC3 short circuit",
        0x45 => "Return sensor HC3 short circuit",
        0x48 => "Flow sensor HC2 open circuit",
        0x49 => "Return sensor HC2 open circuit",
        0x4C => "Flow sensor HC3 open circuit",
        0x4D => "Return sensor HC3 open circuit",
        0x50 => "Cylinder / comfort / charging sensor short circuit",
        0x51 => "Outlet temperature sensor short circuit",
        0x58 => "Cylinder / comfort / charging sensor open circuit",
        0x59 => "Outlet temperature sensor open circuit",
        0x90 => "Solar module: sensor 7 short circuit",
        0x91 => "Solar module: sensor 10 short circuit",
        0x92 => "Solar control: collector sensor short circuit",
        0x93 => "Solar control: collector return sensor short circuit",
        0x94 => "Solar control: cylinder sensor short circuit",
        0x98 => "Solar module: sensor 7 open circuit",
        0x99 => "Solar module: sensor 10 open circuit",
        0x9A => "Solar: collector sensor open circuit",
        0x9B => "Solar: collector return sensor open circuit",
        0x9C => "Solar: cylinder sensor open circuit",
        0x9E => "Solar module: delta-T monitoring",
        0x9F => "Solar control: general fault",
        0xA2 => "Low water pressure",
        0xA3 => "Flue gas temperature sensor fitted incorrectly",
        0xA4 => "System maximum pressure exceeded",
        0xA6 => "Impressed current anode fault",
        0xA7 => "Programming unit clock fault",
        0xA8 => "Internal pump reports air",
        0xA9 => "Internal pump blocked",
        0xB0 => "Flue gas temperature sensor short circuit",
        0xB1 => "Programming unit fault",
        0xB4 => "Internal temperature measurement fault",
        0xB5 => "Internal EEPROM fault",
        0xB7 => "Boiler coding card missing or faulty",
        0xB8 => "Flue gas temperature sensor open circuit",
        0xB9 => "Coding plug data transfer fault",
        0xBA => "Mixer HC2 communication fault",
        0xBB => "Mixer HC3 communication fault",
        0xBC => "Remote control HC1 fault",
        0xBD => "Remote control HC2 fault",
        0xBE => "Remote control HC3 fault",
        0xBF => "LON module missing or faulty",
        0xC1 => "Extension EA1 communication fault",
        0xC2 => "Solar control communication fault",
        0xC3 => "Extension AM1 communication fault",
        0xC4 => "Extension OT communication fault",
        0xC5 => "Variable speed internal pump fault",
        0xC6 => "Variable speed pump HC2 fault",
        0xC7 => "Variable speed pump HC1 fault",
        0xC8 => "Variable speed pump HC3 fault",
        0xC9 => "KM-bus device DAP1 communication fault",
        0xCA => "KM-bus device DAP2 communication fault",
        0xCD => "Vitocom 100 communication fault",
        0xCE => "External extension communication fault",
        0xCF => "LON module communication fault",
        0xD1 => "Burner fault",
        0xD6 => "Digital input 1 fault",
        0xD7 => "Digital input 2 fault",
        0xD8 => "Digital input 3 fault",
        0xDA => "Room temperature sensor HC1 short circuit",
        0xDB => "Room temperature sensor HC2 short circuit",
        0xDC => "Room temperature sensor HC3 short circuit",
        0xDD => "Room temperature sensor HC1 open circuit",
        0xDE => "Room temperature sensor HC2 open circuit",
        0xDF => "Room temperature sensor HC3 open circuit",
        0xE0 => "External LON participant fault",
        0xE1 => "SCOT calibration value above limit",
        0xE2 => "No calibration, insufficient flow",
        0xE3 => "Thermal calibration fault",
        0xE4 => "Burner control 24V supply fault",
        0xE5 => "Burner control flame amplifier fault",
        0xE6 => "Minimum air/water pressure not reached",
        0xE7 => "SCOT calibration value below limit",
        0xE8 => "SCOT ionisation signal deviates",
        0xEA => "SCOT calibration value differs from previous",
        0xEB => "SCOT calibration not carried out",
        0xEC => "SCOT ionisation set value faulty",
        0xED => "SCOT system fault",
        0xEE => "No flame formation",
        0xEF => "Flame loss during safety time",
        0xF0 => "Burner control communication fault",
        0xF1 => "Flue gas temperature limiter tripped",
        0xF2 => "High limit safety cut-out tripped",
        0xF3 => "Flame simulation",
        0xF4 => "No flame formation",
        0xF5 => "Air pressure monitor fault",
        0xF6 => "Gas pressure switch fault",
        0xF7 => "Air pressure switch fault",
        0xF8 => "Gas valve fault",
        0xF9 => "Fan fault, speed not reached",
        0xFA => "Fan fault, standstill not reached",
        0xFB => "Flame loss during operation",
        0xFC => "Gas train electrical control fault",
        0xFD => "Internal burner control fault",
        0xFE => "Service warning",
        0xFF => "Burner control fault without own code",
        _ => return None,
    };
    Some(label)
}
