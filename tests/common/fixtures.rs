//! Model documents shared by the integration tests

pub const PERSON_PET: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<model type="com.apple.IDECoreDataModeler.DataModel" documentVersion="1.0" lastSavedToolsVersion="21754" systemVersion="22E261" minimumToolsVersion="Automatic" sourceLanguage="Swift" userDefinedModelVersionIdentifier="">
    <entity name="Person" representedClassName="Person" syncable="YES" codeGenerationType="class">
        <attribute name="name" attributeType="String"/>
        <relationship name="pets" toMany="YES" deletionRule="Cascade" destinationEntity="Pet" inverseName="owner" inverseEntity="Pet"/>
    </entity>
    <entity name="Pet" representedClassName="Pet" syncable="YES" codeGenerationType="class">
        <attribute name="name" attributeType="String"/>
        <relationship name="owner" maxCount="1" deletionRule="Nullify" destinationEntity="Person" inverseName="pets" inverseEntity="Person"/>
    </entity>
    <elements>
        <element name="Person" positionX="-63" positionY="-18" width="128" height="74"/>
        <element name="Pet" positionX="137" positionY="-18" width="128" height="74"/>
    </elements>
</model>
"#;

/// Every element kind the format describes
pub const MUSIC_LIBRARY: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<model documentVersion="1.0" userDefinedModelVersionIdentifier="2.1">
    <entity name="Media" isAbstract="YES" syncable="YES">
        <attribute name="title" optional="YES" attributeType="String"/>
        <attribute name="added" attributeType="Date" defaultDateTimeInterval="694224000"/>
        <userInfo>
            <entry key="owner" value="catalog"/>
        </userInfo>
    </entity>
    <entity name="Song" representedClassName="SongMO" parentEntity="Media" syncable="YES">
        <attribute name="plays" attributeType="Integer 32" defaultValueString="0" usesScalarValueType="YES"/>
        <attribute name="rating" optional="YES" attributeType="Double" defaultValueString="2.5"/>
        <attribute name="explicit" attributeType="Boolean" defaultValueString="NO"/>
        <attribute name="artwork" optional="YES" attributeType="Transformable" customClassName="NSImage"/>
        <attribute name="cachedLength" optional="YES" transient="YES" attributeType="Float"/>
        <relationship name="album" optional="YES" maxCount="1" deletionRule="Nullify" destinationEntity="Album" inverseName="songs" inverseEntity="Album"/>
        <fetchIndex name="byPlays">
            <fetchIndexElement property="plays" type="Binary" order="descending"/>
        </fetchIndex>
    </entity>
    <entity name="Album" representedClassName="AlbumMO" syncable="YES">
        <attribute name="name" attributeType="String"/>
        <relationship name="songs" optional="YES" toMany="YES" ordered="YES" deletionRule="Cascade" destinationEntity="Song" inverseName="album" inverseEntity="Song"/>
    </entity>
    <configuration name="Cloud" usedWithCloudKit="YES">
        <memberEntity name="Song"/>
        <memberEntity name="Album"/>
    </configuration>
</model>
"#;

pub const TWO_ENTITY_CYCLE: &str = r#"<model>
    <entity name="A" parentEntity="B"/>
    <entity name="B" parentEntity="A"/>
</model>"#;

pub const DANGLING_DESTINATION: &str = r#"<model>
    <entity name="Person">
        <relationship name="pets" toMany="YES" deletionRule="Nullify" destinationEntity="Pet" inverseName="owner" inverseEntity="Pet"/>
    </entity>
</model>"#;

/// `owner` names `pets` but `pets` declares no inverse
pub const ONE_SIDED_INVERSE: &str = r#"<model>
    <entity name="Person">
        <relationship name="pets" toMany="YES" deletionRule="Nullify" destinationEntity="Pet"/>
    </entity>
    <entity name="Pet">
        <relationship name="owner" maxCount="1" deletionRule="Nullify" destinationEntity="Person" inverseName="pets" inverseEntity="Person"/>
    </entity>
</model>"#;

pub const UNKNOWN_ELEMENTS: &str = r#"<model>
    <entity name="Person">
        <attribute name="name" attributeType="String"/>
        <widget kind="fancy"/>
    </entity>
    <gadget/>
</model>"#;

pub const MISSING_NAMES: &str = r#"<model>
    <entity name="Person">
        <attribute attributeType="String"/>
        <attribute name="age" attributeType="Integer 16"/>
    </entity>
    <entity representedClassName="Nameless"/>
</model>"#;

pub const MALFORMED: &str = r#"<model>
    <entity name="Person">
        <attribute name="name" attributeType="String">
    </entity>
</model>"#;

pub const CURRENT_VERSION_PLIST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
	<key>_XCCurrentVersionName</key>
	<string>{version}</string>
</dict>
</plist>
"#;
